use serde::Serialize;

/// Where `bzc` prints. With `--json` every result is one envelope line on
/// stdout (errors on stderr) and `listen` prints one event line per change.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Envelope<'a, T: Serialize> {
    Ok { command: &'a str, data: T },
    Error { error: &'a str },
}

#[derive(Serialize)]
struct ListenLine<'a, T: Serialize> {
    event: &'a str,
    data: T,
}

#[derive(Serialize)]
struct Note<'a> {
    message: &'a str,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn success<T: Serialize>(&self, command: &str, data: T) {
        let rendered = if self.json {
            serde_json::to_string(&Envelope::Ok { command, data })
        } else {
            serde_json::to_string_pretty(&data)
        };
        match rendered {
            Ok(line) => println!("{}", line),
            Err(e) => self.error(&format!("failed to render output: {}", e)),
        }
    }

    /// A result that is only a sentence, such as "Logged out".
    pub fn done(&self, command: &str, message: &str) {
        if self.json {
            self.success(command, Note { message });
        } else {
            println!("{}", message);
        }
    }

    pub fn error(&self, message: &str) {
        if !self.json {
            eprintln!("Error: {}", message);
            return;
        }
        let envelope: Envelope<'_, ()> = Envelope::Error { error: message };
        match serde_json::to_string(&envelope) {
            Ok(line) => eprintln!("{}", line),
            Err(_) => eprintln!("{}", message),
        }
    }

    /// One change seen by `listen`: a message, the chat list, the
    /// connection state or a notice.
    pub fn event<T: Serialize>(&self, kind: &str, data: T) {
        let rendered = if self.json {
            serde_json::to_string(&ListenLine { event: kind, data })
        } else {
            serde_json::to_string(&data).map(|body| format!("[{}] {}", kind, body))
        };
        if let Ok(line) = rendered {
            println!("{}", line);
        }
    }
}
