// Menu module
// The interactive surface: a fixed numbered menu, one selection read from
// standard input, one branch dispatched, then the session ends.

use log::error;
use std::io::BufRead;

use crate::config;
use crate::services::{setup, smoke, webui};

/// A branch of the fixed menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Setup,
    SmokeTests,
    WebUi,
    Exit,
}

/// The fixed menu text
pub fn render_menu() -> String {
    "\nCosyVoice2 launcher\n\n  \
     1. Set up environment (conda env, dependencies, model link)\n  \
     2. Run inference smoke tests\n  \
     3. Launch web UI\n  \
     4. Exit\n\n\
     Select an option [1-4]: "
        .to_string()
}

/// Map a selection line to a menu branch. Anything but 1-4 is invalid.
pub fn parse_choice(input: &str) -> Option<MenuChoice> {
    match input.trim() {
        "1" => Some(MenuChoice::Setup),
        "2" => Some(MenuChoice::SmokeTests),
        "3" => Some(MenuChoice::WebUi),
        "4" => Some(MenuChoice::Exit),
        _ => None,
    }
}

/// Read one selection from the reader. EOF counts as invalid input.
pub fn read_choice<R: BufRead>(reader: &mut R) -> Option<MenuChoice> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => parse_choice(&line),
    }
}

/// Dispatch the selected branch and report its outcome.
/// Returns false when the branch failed.
pub async fn dispatch(choice: Option<MenuChoice>) -> bool {
    let choice = match choice {
        Some(choice) => choice,
        None => {
            println!("Invalid selection, exiting.");
            return true;
        }
    };

    if choice == MenuChoice::Exit {
        println!("Bye.");
        return true;
    }

    let config = match config::get_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            println!("Failed to load configuration, see the log for details.");
            return false;
        }
    };

    match choice {
        MenuChoice::Setup => match setup::run_setup(&config).await {
            Ok(report) => {
                println!(
                    "Linked {} model entries ({} files, {} bytes).",
                    report.entries_linked, report.model_files, report.model_bytes
                );
                if report.import_verified {
                    println!("CosyVoice setup succeeded.");
                    println!(
                        "Activate the environment with 'conda activate {}' to use it directly.",
                        config.conda_env
                    );
                    true
                } else {
                    println!("Setup finished with problems, check the tool output above.");
                    false
                }
            }
            Err(e) => {
                error!("Setup failed: {}", e);
                println!("Setup failed, check the tool output above.");
                false
            }
        },
        MenuChoice::SmokeTests => match smoke::run_smoke(&config, None).await {
            Ok(report) => {
                for result in &report.results {
                    println!(
                        "  [{}] {} -> {}",
                        if result.passed { "pass" } else { "FAIL" },
                        result.name,
                        result.artifact.display()
                    );
                }
                println!(
                    "Smoke suite finished in {:.2}s, outputs in {}.",
                    report.elapsed_seconds,
                    config.output_dir.display()
                );
                if report.all_passed() {
                    println!("All smoke tests passed.");
                    true
                } else {
                    println!("Some smoke tests failed, check the tool output above.");
                    false
                }
            }
            Err(e) => {
                error!("Smoke suite failed: {}", e);
                println!("Smoke tests failed, check the tool output above.");
                false
            }
        },
        MenuChoice::WebUi => match webui::launch_webui(&config).await {
            Ok(()) => {
                println!("Web UI session ended.");
                true
            }
            Err(e) => {
                error!("Web UI launch failed: {}", e);
                println!("Web UI launch failed, check the tool output above.");
                false
            }
        },
        MenuChoice::Exit => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_choice_valid() {
        assert_eq!(parse_choice("1"), Some(MenuChoice::Setup));
        assert_eq!(parse_choice("2"), Some(MenuChoice::SmokeTests));
        assert_eq!(parse_choice("3"), Some(MenuChoice::WebUi));
        assert_eq!(parse_choice("4"), Some(MenuChoice::Exit));
    }

    #[test]
    fn test_parse_choice_trims_whitespace() {
        assert_eq!(parse_choice(" 2 \n"), Some(MenuChoice::SmokeTests));
        assert_eq!(parse_choice("\t4\t"), Some(MenuChoice::Exit));
    }

    #[test]
    fn test_parse_choice_invalid() {
        assert_eq!(parse_choice("5"), None);
        assert_eq!(parse_choice("0"), None);
        assert_eq!(parse_choice("12"), None);
        assert_eq!(parse_choice("setup"), None);
        assert_eq!(parse_choice(""), None);
    }

    #[test]
    fn test_read_choice() {
        let mut input = Cursor::new(b"3\n".to_vec());
        assert_eq!(read_choice(&mut input), Some(MenuChoice::WebUi));

        let mut empty = Cursor::new(Vec::new());
        assert_eq!(read_choice(&mut empty), None, "EOF is invalid input");
    }

    #[test]
    fn test_render_menu_lists_all_branches() {
        let menu = render_menu();
        for entry in ["1.", "2.", "3.", "4."] {
            assert!(menu.contains(entry));
        }
        assert!(menu.contains("[1-4]"));
    }

    #[tokio::test]
    async fn test_dispatch_invalid_and_exit() {
        assert!(dispatch(None).await);
        assert!(dispatch(Some(MenuChoice::Exit)).await);
    }
}
