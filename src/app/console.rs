use crate::migration::Operator;
use std::io::{self, BufRead, Write};

/// Operator on the controlling terminal. Engine output goes to stdout; prompts and
/// warnings go to stderr so stdout stays a clean transcript.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn confirm(&self, prompt: &str) -> bool {
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "{prompt} [y/N] ");
        let _ = stderr.flush();
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&answer),
        }
    }

    fn show_line(&self, line: &str) {
        println!("{line}");
    }

    fn warn(&self, message: &str) {
        eprintln!("warning: {message}");
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
