use crate::display;
use log::{error, info, warn};
use overlay_kit_core::{AsyncOverlayContext, OverlayController, OverlayId, OverlayResponse};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::Poll;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  open <text>            open an overlay
  open-id <id> <text>    open an overlay under a chosen id
  ask <question>         open an overlay that waits for an answer
  answer <id> <text>     answer a question and close it
  close <id>             close an overlay (it exits, then unmounts)
  unmount <id>           remove an overlay immediately
  close-all              close every overlay
  unmount-all            remove every overlay
  list                   show the registry
  help                   show this help
  quit                   leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(String),
    OpenWithId(OverlayId, String),
    Ask(String),
    Answer(OverlayId, String),
    Close(OverlayId),
    Unmount(OverlayId),
    CloseAll,
    UnmountAll,
    List,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0} (try 'help')")]
    Unknown(String),

    #[error("Missing argument for '{0}'")]
    MissingArgument(&'static str),

    #[error("Invalid overlay id: {0}")]
    InvalidId(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name {
            "" => Err(CommandError::Empty),
            "open" => Ok(Command::Open(text_arg("open", rest)?)),
            "open-id" => {
                let (id, text) = id_and_text("open-id", rest)?;
                Ok(Command::OpenWithId(id, text))
            }
            "ask" => Ok(Command::Ask(text_arg("ask", rest)?)),
            "answer" => {
                let (id, text) = id_and_text("answer", rest)?;
                Ok(Command::Answer(id, text))
            }
            "close" => Ok(Command::Close(parse_id("close", rest)?)),
            "unmount" => Ok(Command::Unmount(parse_id("unmount", rest)?)),
            "close-all" => Ok(Command::CloseAll),
            "unmount-all" => Ok(Command::UnmountAll),
            "list" | "ls" => Ok(Command::List),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn text_arg(command: &'static str, rest: &str) -> Result<String, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::MissingArgument(command));
    }
    Ok(rest.to_string())
}

fn parse_id(command: &'static str, value: &str) -> Result<OverlayId, CommandError> {
    if value.is_empty() {
        return Err(CommandError::MissingArgument(command));
    }
    value
        .trim_start_matches('#')
        .parse()
        .map_err(|_| CommandError::InvalidId(value.to_string()))
}

fn id_and_text(command: &'static str, rest: &str) -> Result<(OverlayId, String), CommandError> {
    let (id, text) = rest
        .split_once(char::is_whitespace)
        .ok_or(CommandError::MissingArgument(command))?;
    Ok((parse_id(command, id)?, text_arg(command, text.trim())?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Outcome of a question opened with `ask`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Given(OverlayId, String),
    Dismissed(OverlayId),
}

type Questions = Arc<Mutex<HashMap<OverlayId, AsyncOverlayContext<String, String>>>>;

pub struct Shell {
    overlays: OverlayController<String>,
    /// Contexts of unanswered questions, filled in when they render
    questions: Questions,
    responses: Vec<OverlayResponse<String>>,
}

impl Shell {
    pub fn new(overlays: OverlayController<String>) -> Self {
        Self {
            overlays,
            questions: Arc::new(Mutex::new(HashMap::new())),
            responses: Vec::new(),
        }
    }

    pub fn execute(&mut self, command: Command) -> Flow {
        match command {
            Command::Open(text) => {
                let id = self.overlays.open(move |ctx| format!("#{} {}", ctx.overlay_id(), text));
                info!("Opened overlay {}", id);
            }
            Command::OpenWithId(id, text) => {
                match self
                    .overlays
                    .open_with_id(id, move |ctx| format!("#{} {}", ctx.overlay_id(), text))
                {
                    Ok(id) => info!("Opened overlay {}", id),
                    Err(e) => error!("Could not open overlay: {e}"),
                }
            }
            Command::Ask(question) => self.ask(question),
            Command::Answer(id, text) => {
                let question = self
                    .questions
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                match question {
                    Some(ctx) => ctx.close(text),
                    None => warn!("No open question with id {}", id),
                }
            }
            Command::Close(id) => self.overlays.close(id),
            Command::Unmount(id) => self.overlays.unmount(id),
            Command::CloseAll => self.overlays.close_all(),
            Command::UnmountAll => self.overlays.unmount_all(),
            Command::List => display::print_listing(&self.overlays.store().snapshot()),
            Command::Help => println!("{HELP}"),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn ask(&mut self, question: String) {
        let questions = self.questions.clone();
        let response = self
            .overlays
            .open_async(move |ctx: &AsyncOverlayContext<String, String>| {
                if ctx.is_open() {
                    questions
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entry(ctx.overlay_id())
                        .or_insert_with(|| ctx.clone());
                }
                format!("#{} ? {}", ctx.overlay_id(), question)
            });

        info!("Asked question {}", response.id());
        self.responses.push(response);
    }

    /// Drain questions that were answered or unmounted since the last call
    pub fn collect_answers(&mut self) -> Vec<Answer> {
        let mut answers = Vec::new();
        self.responses.retain_mut(|response| {
            let answer = match response.try_take() {
                Poll::Pending => return true,
                Poll::Ready(Some(text)) => Answer::Given(response.id(), text),
                Poll::Ready(None) => Answer::Dismissed(response.id()),
            };
            answers.push(answer);
            false
        });

        let mut questions = self.questions.lock().unwrap_or_else(PoisonError::into_inner);
        for answer in &answers {
            if let Answer::Dismissed(id) = answer {
                questions.remove(id);
            }
        }
        answers
    }

    /// Read commands line by line until input ends or `quit`
    pub fn run<R: BufRead>(&mut self, input: R, prompt: Option<&str>) -> io::Result<()> {
        let mut lines = input.lines();

        loop {
            if let Some(prompt) = prompt {
                print!("{prompt}");
                io::stdout().flush()?;
            }

            let Some(line) = lines.next() else {
                break;
            };
            let line = line?;
            if prompt.is_none() && !line.trim().is_empty() {
                println!("> {}", line.trim());
            }

            let flow = match line.parse::<Command>() {
                Ok(command) => self.execute(command),
                Err(CommandError::Empty) => Flow::Continue,
                Err(e) => {
                    warn!("{e}");
                    Flow::Continue
                }
            };

            for answer in self.collect_answers() {
                display::print_answer(&answer);
            }

            if flow == Flow::Quit {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_commands() {
        assert_eq!("open Hello there".parse(), Ok(Command::Open("Hello there".into())));
        assert_eq!("close 3".parse(), Ok(Command::Close(3)));
        assert_eq!("unmount #12".parse(), Ok(Command::Unmount(12)));
        assert_eq!("  close-all  ".parse(), Ok(Command::CloseAll));
        assert_eq!("unmount-all".parse(), Ok(Command::UnmountAll));
        assert_eq!(
            "open-id 40 Saved!".parse(),
            Ok(Command::OpenWithId(40, "Saved!".into()))
        );
        assert_eq!(
            "answer 2 yes please".parse(),
            Ok(Command::Answer(2, "yes please".into()))
        );
        assert_eq!("exit".parse(), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!("open".parse::<Command>(), Err(CommandError::MissingArgument("open")));
        assert_eq!(
            "close abc".parse::<Command>(),
            Err(CommandError::InvalidId("abc".into()))
        );
        assert_eq!(
            "answer 4".parse::<Command>(),
            Err(CommandError::MissingArgument("answer"))
        );
        assert_eq!(
            "launch".parse::<Command>(),
            Err(CommandError::Unknown("launch".into()))
        );
    }

    #[test]
    fn test_execute_lifecycle() {
        let overlays = OverlayController::new();
        let mut shell = Shell::new(overlays.clone());

        shell.execute(Command::Open("first".into()));
        shell.execute(Command::Open("second".into()));
        shell.execute(Command::Close(1));

        let snapshot = overlays.store().snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot[0].is_open());
        assert_eq!(snapshot[1].render(), "#2 second");

        shell.execute(Command::UnmountAll);
        assert!(overlays.store().is_empty());
        assert_eq!(shell.execute(Command::Quit), Flow::Quit);
    }

    #[test]
    fn test_ask_and_answer() {
        let overlays = OverlayController::new();
        let mut shell = Shell::new(overlays.clone());

        shell.execute(Command::Ask("Save changes?".into()));
        let id = overlays.store().ids()[0];
        assert!(shell.collect_answers().is_empty());

        // Rendering registers the question so it can be answered
        assert_eq!(overlays.store().get(id).unwrap().render(), format!("#{id} ? Save changes?"));
        shell.execute(Command::Answer(id, "yes".into()));

        assert_eq!(shell.collect_answers(), vec![Answer::Given(id, "yes".into())]);
        assert!(!overlays.store().get(id).unwrap().is_open());
    }

    #[test]
    fn test_unmounted_question_is_dismissed() {
        let overlays = OverlayController::new();
        let mut shell = Shell::new(overlays.clone());

        shell.execute(Command::Ask("Continue?".into()));
        let id = overlays.store().ids()[0];
        overlays.store().get(id).unwrap().render();

        shell.execute(Command::Unmount(id));
        assert_eq!(shell.collect_answers(), vec![Answer::Dismissed(id)]);
        assert_eq!(
            shell.execute(Command::Answer(id, "too late".into())),
            Flow::Continue
        );
        assert!(shell.collect_answers().is_empty());
    }

    #[test]
    fn test_close_all_then_unmount_all_dismisses_questions() {
        let overlays = OverlayController::new();
        let mut shell = Shell::new(overlays.clone());

        shell.execute(Command::Ask("First?".into()));
        shell.execute(Command::Ask("Second?".into()));
        for id in overlays.store().ids() {
            overlays.store().get(id).unwrap().render();
        }

        shell.execute(Command::CloseAll);
        assert!(shell.collect_answers().is_empty());

        shell.execute(Command::UnmountAll);
        assert_eq!(
            shell.collect_answers(),
            vec![Answer::Dismissed(1), Answer::Dismissed(2)]
        );
    }

    #[test]
    fn test_run_script_until_quit() {
        let overlays = OverlayController::new();
        let mut shell = Shell::new(overlays.clone());
        let script = "open one\nbogus\n\nopen two\nquit\nopen three\n";

        shell.run(Cursor::new(script), None).unwrap();
        assert_eq!(overlays.store().ids(), vec![1, 2]);
    }
}
