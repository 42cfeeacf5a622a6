//! Read-only built-in notes.
//!
//! System notes are produced on demand and never stored in a backend. Their
//! names share the `system:` prefix, which keeps them apart from user notes.

/// Name of the note that always exists and cannot be deleted
pub const SCRATCH_NOTE_NAME: &str = "scratch";
pub const DAILY_JOURNAL_NOTE_NAME: &str = "daily journal";
pub const INBOX_NOTE_NAME: &str = "inbox";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemNote {
    Help,
    ReleaseNotes,
    Welcome,
    WelcomeDev,
    BuiltInFunctions,
}

impl SystemNote {
    pub const ALL: [SystemNote; 5] = [
        SystemNote::Help,
        SystemNote::ReleaseNotes,
        SystemNote::Welcome,
        SystemNote::WelcomeDev,
        SystemNote::BuiltInFunctions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SystemNote::Help => "system:help",
            SystemNote::ReleaseNotes => "system:Release Notes",
            SystemNote::Welcome => "system:welcome",
            SystemNote::WelcomeDev => "system:welcome dev",
            SystemNote::BuiltInFunctions => "system:built in functions",
        }
    }

    pub fn from_name(name: &str) -> Option<SystemNote> {
        Self::ALL.into_iter().find(|n| n.name() == name)
    }

    pub fn content(self) -> String {
        match self {
            SystemNote::Help => HELP.to_string(),
            SystemNote::ReleaseNotes => RELEASE_NOTES.to_string(),
            SystemNote::Welcome => welcome_note(),
            SystemNote::WelcomeDev => format!("{}\n{}", welcome_note(), WELCOME_DEV_EXTRA),
            SystemNote::BuiltInFunctions => BUILT_IN_FUNCTIONS.to_string(),
        }
    }
}

pub fn is_system_note_name(name: &str) -> bool {
    SystemNote::from_name(name).is_some()
}

/// Content of a system note, or `None` for a user note name.
pub fn get(name: &str) -> Option<String> {
    SystemNote::from_name(name).map(SystemNote::content)
}

/// Initial content of the scratch note.
pub fn welcome_note() -> String {
    WELCOME.to_string()
}

pub fn inbox_note() -> String {
    INBOX.to_string()
}

pub fn journal_note() -> String {
    JOURNAL.to_string()
}

const WELCOME: &str = "\
Welcome to your notes.

This is the scratch note. It always exists and cannot be deleted, so it is a
good place for quick, throwaway text.

- Create notes with any name you like.
- Notes can be kept in the built-in key-value store or in a directory of
  plain text files you choose.
- Notes in a directory can be encrypted with a password.

Open system:help for more.
";

const WELCOME_DEV_EXTRA: &str = "\
Development build: storage and encryption logging is enabled with
RUST_LOG=notevault=debug.
";

const INBOX: &str = "\
Inbox

Capture things here and sort them later.
";

const JOURNAL: &str = "\
Daily journal

One section per day, newest first.
";

const HELP: &str = "\
Help

Storage
  Notes live in one place at a time: the key-value store (default) or a
  directory. Moving to a directory copies every note there and removes it
  from the key-value store. When a note of the same name already exists
  with different content, the moved note is saved as name-1, name-2, ...
  so nothing is overwritten.

Files
  Each note is one file: <name>.edna.txt, or <name>.encr.edna.txt when
  encrypted. Characters not allowed in file names are written as %XX.

Encryption
  Encrypting all notes asks for a password. The password is remembered on
  this machine; if it stops matching you are asked again.

Protected notes
  scratch and system:* notes cannot be deleted or renamed.
";

const RELEASE_NOTES: &str = "\
Release Notes

0.1.0
  - key-value and directory storage
  - moving notes between storage locations without losing content
  - password-based note encryption
";

const BUILT_IN_FUNCTIONS: &str = "\
Built-in functions

Functions are provided by the editor and are not available from the
command line.
";
