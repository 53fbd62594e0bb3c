use crate::shell::Answer;
use colored::*;
use log::debug;
use overlay_kit_core::{Config, OverlayInstance, OverlaySurface, RenderedOverlay};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

fn frame_lines(frame: &[RenderedOverlay<String>], show_closing: bool) -> Vec<String> {
    frame
        .iter()
        .filter(|overlay| overlay.is_open || show_closing)
        .map(|overlay| {
            if overlay.is_open {
                format!("  {}", overlay.view.green().bold())
            } else {
                format!("  {} {}", overlay.view.dimmed(), "(closing)".dimmed())
            }
        })
        .collect()
}

/// Frame hook for the surface
pub fn print_frame(frame: &[RenderedOverlay<String>]) {
    let lines = frame_lines(frame, Config::show_closing());
    if lines.is_empty() {
        println!("{}", "  (no overlays)".dimmed());
        return;
    }
    for line in lines {
        println!("{line}");
    }
}

pub fn print_listing(instances: &[OverlayInstance<String>]) {
    if instances.is_empty() {
        println!("No overlays mounted");
        return;
    }

    println!("{:>6}  {}", "ID".bold(), "STATE".bold());
    for instance in instances {
        let state = if instance.is_open() {
            "open".green()
        } else {
            "closing".yellow()
        };
        println!("{:>6}  {}", instance.id(), state);
    }
}

pub fn print_answer(answer: &Answer) {
    match answer {
        Answer::Given(id, text) => println!("{} #{id}: {}", "answer".cyan().bold(), text),
        Answer::Dismissed(id) => println!("{} #{id}", "dismissed".yellow()),
    }
}

/// Drive exit transitions until `shutdown` is set
pub fn spawn_ticker(
    surface: Arc<OverlaySurface<String>>,
    shutdown: Arc<AtomicBool>,
    interval: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        debug!("Ticker started ({interval:?})");
        while !shutdown.load(Ordering::SeqCst) {
            let finished = surface.tick(Instant::now());
            if finished > 0 {
                debug!("Unmounted {finished} overlays after their exit");
            }
            thread::sleep(interval);
        }
        debug!("Ticker stopped");
    })
}
