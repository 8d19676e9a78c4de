//! Shell command parsing.

use prism_collab::CursorPosition;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the virtual files of the active tab.
    Files,
    Show(String),
    /// Replace a virtual file with the contents of a file on disk.
    Write { file: String, path: String },
    Cursor { file: String, position: CursorPosition },
    Who,
    /// List saved projects, marking the current one.
    Projects,
    NewProject,
    SelectProject(usize),
    DeleteProject(usize),
    RenameProject(String),
    /// List the generated versions of the current project.
    History,
    Restore(u32),
    NewTab,
    SwitchTab(usize),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["files"] => Ok(Command::Files),
            ["show", file] => Ok(Command::Show(file.to_string())),
            ["write", file, path] => Ok(Command::Write {
                file: file.to_string(),
                path: path.to_string(),
            }),
            ["cursor", file, line, column] => {
                let line = parse_number(line, "line")?;
                let column = parse_number(column, "column")?;
                Ok(Command::Cursor {
                    file: file.to_string(),
                    position: CursorPosition::new(line, column),
                })
            }
            ["who"] => Ok(Command::Who),
            ["projects"] => Ok(Command::Projects),
            ["project", "new"] => Ok(Command::NewProject),
            ["project", "delete", n] => {
                Ok(Command::DeleteProject(parse_number(n, "project")? as usize))
            }
            ["project", "rename"] => Err("project rename needs a name".to_string()),
            ["project", "rename", name @ ..] => Ok(Command::RenameProject(name.join(" "))),
            ["project", n] => Ok(Command::SelectProject(parse_number(n, "project")? as usize)),
            ["history"] => Ok(Command::History),
            ["restore", version] => Ok(Command::Restore(parse_number(version, "version")?)),
            ["tab", "new"] => Ok(Command::NewTab),
            ["tab", n] => Ok(Command::SwitchTab(parse_number(n, "tab")? as usize)),
            ["help"] => Ok(Command::Help),
            ["quit"] | ["exit"] => Ok(Command::Quit),
            [] => Err("empty command".to_string()),
            [other, ..] => Err(format!("unknown command: {other}")),
        }
    }
}

fn parse_number(word: &str, what: &str) -> Result<u32, String> {
    word.parse()
        .map_err(|_| format!("{what} must be a number, got {word:?}"))
}

pub const HELP: &str = "\
files                      list virtual files
show <file>                print a virtual file
write <file> <path>        replace a virtual file with a file from disk
cursor <file> <line> <col> move this tab's cursor
who                        list other participants
projects                   list saved projects
project new                start a new project
project <n>                open project n in every tab
project delete <n>         delete project n
project rename <name>      rename the current project
history                    list generated versions
restore <version>          make an earlier version current
tab new                    open another tab on the current project
tab <n>                    switch to tab n
quit                       leave and exit";
