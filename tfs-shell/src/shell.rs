//! Command parsing and the read-eval loop
use std::fmt::Display;
use std::io::{self, BufRead, Write};

use tiny_fs::{check, Session};

/// How input reaches the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Prompt before every line
    Interactive,
    /// Echo every line before its output
    Script,
}

/// One parsed shell line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Mkdir(&'a str),
    Cd(&'a str),
    Home,
    Rmdir(&'a str),
    Ls,
    Create(&'a str),
    Append(&'a str, &'a str),
    Cat(&'a str),
    Tail(&'a str, usize),
    Rm(&'a str),
    Stat(&'a str),
    Check,
    Help,
    Quit,
}

const HELP: &str = "\
mkdir <dir>           make a directory
cd <dir>              enter a directory
home                  go back to the root directory
rmdir <dir>           remove an empty directory
ls                    list the current directory
create <file>         make an empty file
append <file> <data>  append the rest of the line to a file
cat <file>            print a file
tail <file> <n>       print the last n bytes of a file
rm <file>             remove a file
stat <name>           describe a file or directory
check                 verify the disk
quit                  leave the shell";

/// Split off the first whitespace-separated word
fn split_word(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    match line.find(char::is_whitespace) {
        Some(end) => (&line[..end], &line[end..]),
        None => (line, ""),
    }
}

impl<'a> Command<'a> {
    /// `None` for unknown commands or a wrong number of arguments
    pub fn parse(line: &'a str) -> Option<Self> {
        let (cmd, rest) = split_word(line);
        let (name, tail) = split_word(rest);
        let tail = tail.trim();
        let one = |build: fn(&'a str) -> Self| {
            (!name.is_empty() && tail.is_empty()).then(|| build(name))
        };
        let none = |command: Self| (name.is_empty()).then(|| command);
        match cmd {
            "mkdir" => one(Command::Mkdir),
            "cd" => one(Command::Cd),
            "home" => none(Command::Home),
            "rmdir" => one(Command::Rmdir),
            "ls" => none(Command::Ls),
            "create" => one(Command::Create),
            "append" if !name.is_empty() && !tail.is_empty() => {
                Some(Command::Append(name, rest.trim_start()[name.len()..].trim_start()))
            }
            "cat" => one(Command::Cat),
            "tail" if !name.is_empty() => {
                let (n, extra) = split_word(tail);
                match (n.parse::<usize>(), extra.is_empty()) {
                    (Ok(n), true) => Some(Command::Tail(name, n)),
                    _ => None,
                }
            }
            "rm" => one(Command::Rm),
            "stat" => one(Command::Stat),
            "check" => none(Command::Check),
            "help" => none(Command::Help),
            "quit" | "exit" => none(Command::Quit),
            _ => None,
        }
    }
}

/// Run one command, `Ok(false)` once the shell should stop
pub fn execute(session: &mut Session, command: Command, out: &mut impl Write) -> io::Result<bool> {
    let report = match command {
        Command::Mkdir(name) => session.mkdir(name).map(|_| Vec::new()),
        Command::Cd(name) => session.cd(name).map(|_| Vec::new()),
        Command::Home => {
            session.home();
            Ok(Vec::new())
        }
        Command::Rmdir(name) => session.rmdir(name).map(|_| Vec::new()),
        Command::Ls => session.ls().map(lines),
        Command::Create(name) => session.create(name).map(|_| Vec::new()),
        Command::Append(name, data) => session.append(name, data.as_bytes()).map(|_| Vec::new()),
        Command::Cat(name) => session.cat(name).map(with_newline),
        Command::Tail(name, n) => session.tail(name, n).map(with_newline),
        Command::Rm(name) => session.rm(name).map(|_| Vec::new()),
        Command::Stat(name) => session.stat(name).map(|stat| lines([stat])),
        Command::Check => check(&session.fs().lock()).map(|usage| {
            lines([
                format!("Directories: {}", usage.directories),
                format!("Files: {}", usage.files),
                format!("Data blocks: {}", usage.data_blocks),
                format!("Free blocks: {}", usage.free_blocks),
                format!("Leaked blocks: {}", usage.leaked),
            ])
        }),
        Command::Help => Ok(lines([HELP])),
        Command::Quit => return Ok(false),
    };
    match report {
        Ok(bytes) => out.write_all(&bytes)?,
        Err(err) => writeln!(out, "{}", err)?,
    }
    Ok(true)
}

/// One item per line
fn lines<T: Display>(items: impl IntoIterator<Item = T>) -> Vec<u8> {
    items
        .into_iter()
        .map(|item| format!("{}\n", item))
        .collect::<String>()
        .into_bytes()
}

fn with_newline(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.push(b'\n');
    bytes
}

/// Read commands until end of input or `quit`
pub fn run(
    session: &mut Session,
    input: impl BufRead,
    out: &mut impl Write,
    mode: Mode,
) -> io::Result<()> {
    let mut lines = input.lines();
    loop {
        if mode == Mode::Interactive {
            write!(out, "% ")?;
            out.flush()?;
        }
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        if mode == Mode::Script {
            writeln!(out, "% {}", line)?;
        }
        if line.trim().is_empty() {
            continue;
        }
        let keep_going = match Command::parse(&line) {
            Some(command) => execute(session, command, out)?,
            None => {
                writeln!(out, "Invalid command")?;
                true
            }
        };
        if !keep_going {
            break;
        }
    }
    out.flush()
}
