//! Subscribe / unsubscribe command frames

use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Subscribe,
    Unsubscribe,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Subscribe => "subscribe",
            CommandKind::Unsubscribe => "unsubscribe",
        }
    }
}

/// A stream command, serialized as `{"command": "subscribe", "streams": [...], ...}`
///
/// Empty topic lists are left out of the frame entirely, since both servers
/// reject some empty lists with `invalidParams`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub command: CommandKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accounts_proposed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub books: Vec<Value>,
}

impl StreamCommand {
    pub fn subscribe() -> Self {
        Self::new(CommandKind::Subscribe)
    }

    pub fn unsubscribe() -> Self {
        Self::new(CommandKind::Unsubscribe)
    }

    fn new(command: CommandKind) -> Self {
        Self {
            id: None,
            command,
            streams: Vec::new(),
            accounts: Vec::new(),
            accounts_proposed: Vec::new(),
            books: Vec::new(),
        }
    }

    pub fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Add a named stream (`ledger`, `transactions`, `validations`, ...)
    pub fn stream(mut self, stream: &str) -> Self {
        self.streams.push(stream.to_string());
        self
    }

    pub fn account(mut self, account: &str) -> Self {
        self.accounts.push(account.to_string());
        self
    }

    pub fn account_proposed(mut self, account: &str) -> Self {
        self.accounts_proposed.push(account.to_string());
        self
    }

    /// Add an order book description (`taker_gets`, `taker_pays`, `snapshot`, ...)
    pub fn book(mut self, book: Value) -> Self {
        self.books.push(book);
        self
    }

    /// The frame as sent on the wire
    pub fn to_value(&self) -> Value {
        let mut frame = Map::new();
        if let Some(id) = self.id {
            frame.insert("id".to_string(), json!(id));
        }
        frame.insert("command".to_string(), json!(self.command.as_str()));

        let topics = [
            ("streams", &self.streams),
            ("accounts", &self.accounts),
            ("accounts_proposed", &self.accounts_proposed),
        ];
        for (key, topic) in topics {
            if !topic.is_empty() {
                frame.insert(key.to_string(), json!(topic));
            }
        }
        if !self.books.is_empty() {
            frame.insert("books".to_string(), Value::Array(self.books.clone()));
        }

        Value::Object(frame)
    }
}

impl From<StreamCommand> for Value {
    fn from(command: StreamCommand) -> Value {
        command.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_streams() {
        let cmd = StreamCommand::subscribe()
            .id(1)
            .stream("ledger")
            .stream("transactions");
        assert_eq!(
            cmd.to_value(),
            json!({"id": 1, "command": "subscribe", "streams": ["ledger", "transactions"]})
        );
    }

    #[test]
    fn test_empty_topics_are_omitted() {
        let cmd = StreamCommand::unsubscribe().account("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh");
        assert_eq!(
            cmd.to_value(),
            json!({"command": "unsubscribe", "accounts": ["rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh"]})
        );
    }

    #[test]
    fn test_books() {
        let book = json!({
            "taker_pays": {"currency": "XRP"},
            "taker_gets": {"currency": "USD", "issuer": "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh"},
            "snapshot": true
        });
        let value: Value = StreamCommand::subscribe().book(book.clone()).into();
        assert_eq!(value["books"], json!([book]));
        assert!(value.get("streams").is_none());
    }

    #[test]
    fn test_frame_matches_serde_form() {
        let cmd = StreamCommand::subscribe()
            .id(9)
            .stream("ledger")
            .account("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh")
            .account_proposed("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh")
            .book(json!({"taker_pays": {"currency": "XRP"}}));
        assert_eq!(cmd.to_value(), serde_json::to_value(&cmd).unwrap());

        let bare = StreamCommand::unsubscribe();
        assert_eq!(bare.to_value(), json!({"command": "unsubscribe"}));
        assert_eq!(CommandKind::Unsubscribe.as_str(), "unsubscribe");
    }
}
