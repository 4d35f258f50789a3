use reedline::{
    default_emacs_keybindings, ColumnarMenu, DefaultCompleter, EditCommand, Emacs, KeyCode,
    KeyModifiers, MenuBuilder, Reedline, ReedlineEvent, ReedlineMenu, Signal,
};

use nu_ansi_term::{Color, Style};

use super::prompt::{completion_marker, Prompt};
use crate::warning;

const EXIT_COMMAND: &str = "/exit";
const STATUS_COMMAND: &str = "/status";

/// What the user asked for at the prompt.
pub(crate) enum Input {
    Message(String),
    Status,
    Exit,
}

/// Maps a submitted line to an input. Lines starting with `/` are commands.
fn parse_line(line: String) -> Option<Input> {
    match line.trim() {
        EXIT_COMMAND => Some(Input::Exit),
        STATUS_COMMAND => Some(Input::Status),
        "" => None,
        command if command.starts_with('/') => {
            warning!("unknown command \"{}\"", command);
            None
        }
        _ => Some(Input::Message(line)),
    }
}

fn edit_mode() -> Box<Emacs> {
    let mut keybindings = default_emacs_keybindings();

    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu("completion_menu".to_string()),
            ReedlineEvent::MenuNext,
        ]),
    );

    keybindings.add_binding(
        KeyModifiers::CONTROL,
        KeyCode::Char('j'),
        ReedlineEvent::Edit(vec![EditCommand::InsertNewline]),
    );

    Box::new(Emacs::new(keybindings))
}

pub(crate) struct Repl {
    line_editor: Reedline,
    prompt: Prompt,
}

impl Repl {
    pub(crate) fn new() -> Repl {
        let commands = vec![EXIT_COMMAND.into(), STATUS_COMMAND.into()];

        let mut completer = Box::new(DefaultCompleter::with_inclusions(&['/']));

        completer.insert(commands);

        // Use the interactive menu to select options from the completer
        let completion_menu = Box::new(
            ColumnarMenu::default()
                .with_name("completion_menu")
                .with_marker(&completion_marker().to_string())
                .with_text_style(Style::new().fg(Color::Default))
                .with_selected_text_style(Style::new().fg(Color::Blue).on(Color::DarkGray))
                .with_selected_match_text_style(
                    Style::new().fg(Color::Blue).bold().on(Color::DarkGray),
                ),
        );

        let line_editor = Reedline::create()
            .with_completer(completer)
            .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
            .with_edit_mode(edit_mode());

        Repl {
            line_editor,
            prompt: Prompt::default(),
        }
    }

    /// Reads lines until one of them is a message or a command.
    pub(crate) fn read(&mut self) -> Input {
        loop {
            match self.line_editor.read_line(&self.prompt) {
                Ok(Signal::Success(line)) => match parse_line(line) {
                    Some(input) => return input,
                    None => continue,
                },
                Ok(Signal::CtrlC) => continue,
                Ok(Signal::CtrlD) => return Input::Exit,
                Err(err) => {
                    warning!("failed to read input: {}", err);
                    return Input::Exit;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert!(matches!(parse_line("/exit".to_string()), Some(Input::Exit)));
        assert!(matches!(parse_line(" /status ".to_string()), Some(Input::Status)));
        assert!(parse_line("   ".to_string()).is_none());
        assert!(parse_line("/nope".to_string()).is_none());

        match parse_line("  hello there ".to_string()) {
            Some(Input::Message(message)) => assert_eq!(message, "  hello there "),
            _ => panic!("expected a message"),
        }
    }
}
