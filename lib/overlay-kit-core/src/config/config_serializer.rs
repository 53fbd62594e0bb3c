use crate::config::Config;
use schemars::{schema_for, Schema};
use std::collections::HashMap;

/// Serialize the config as YAML with each field's doc comment above it
pub fn serialize_config(config: &Config) -> Result<String, serde_yaml::Error> {
    let yaml_string = serde_yaml::to_string(config)?;
    let mut field_docs = HashMap::new();
    let config_schema = schema_for!(Config);
    extract_field_documentation(&config_schema, "", &mut field_docs);

    let mut output = String::new();
    output.push_str("# OverlayKit Configuration File\n");
    output.push_str("# Missing fields fall back to their defaults\n\n");
    output.push_str(&add_comments_to_yaml(&yaml_string, &field_docs));
    output.push('\n');
    Ok(output)
}

fn extract_field_documentation(
    schema: &Schema,
    prefix: &str,
    field_docs: &mut HashMap<String, String>,
) {
    let Some(properties) = schema
        .as_object()
        .and_then(|schema_obj| schema_obj.get("properties"))
        .and_then(|properties| properties.as_object())
    else {
        return;
    };

    for (key, prop_value) in properties {
        let field_path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        let Some(prop_obj) = prop_value.as_object() else {
            continue;
        };

        if let Some(desc_str) = prop_obj.get("description").and_then(|d| d.as_str()) {
            field_docs.insert(field_path.clone(), desc_str.to_string());
        }

        if prop_obj.contains_key("properties") {
            if let Ok(nested_schema) = Schema::try_from(prop_value.clone()) {
                extract_field_documentation(&nested_schema, &field_path, field_docs);
            }
        }
    }
}

fn add_comments_to_yaml(yaml: &str, field_docs: &HashMap<String, String>) -> String {
    let mut result = Vec::new();
    let mut field_path_stack = Vec::new();

    for line in yaml.lines() {
        if let Some(colon_pos) = line.find(':') {
            let before_colon = &line[..colon_pos];
            let field_name = before_colon.trim();

            let indent_level = (before_colon.len() - before_colon.trim_start().len()) / 2;
            let indent = "  ".repeat(indent_level);
            field_path_stack.truncate(indent_level);
            field_path_stack.push(field_name.to_string());

            if let Some(doc) = field_docs.get(&field_path_stack.join(".")) {
                if !result.is_empty() {
                    result.push(String::new());
                }
                result.push(format!("{}# {}", indent, doc));
            }
        }

        result.push(line.to_string());
    }

    result.join("\n")
}
