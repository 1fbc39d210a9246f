// Wire format: one JSON envelope per connection. The payload is itself a
// JSON document so every command shares the same envelope shape. Unknown
// keys are rejected everywhere.

use crate::core::{Block, Transaction};
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Version,
    GetTransactions,
    Transactions,
    GetBlocks,
    Blocks,
    Ping,
    Pong,
}

/// The envelope every datagram travels in. `from_port` lets the receiver
/// rebuild the sender's listening endpoint from the observed remote host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    pub command: Command,
    pub payload: String,
    pub from_port: u32,
}

impl Message {
    pub fn new<P: Serialize>(command: Command, payload: &P, from_port: u16) -> Result<Message> {
        Ok(Message {
            command,
            payload: serde_json::to_string(payload)?,
            from_port: from_port as u32,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Trailing whitespace is tolerated; anything else after the envelope
    /// is a decode error.
    pub fn decode(bytes: &[u8]) -> Result<Message> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn decode_payload<P: DeserializeOwned>(&self) -> Result<P> {
        Ok(serde_json::from_str(self.payload.as_str())?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionPayload {
    pub version: u32,
    pub block_height: u64,
}

/// GET_TRANSACTIONS, PING and PONG carry no data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmptyPayload {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionsPayload {
    pub transactions: Vec<Transaction>,
}

/// An empty `from_block_hash` asks for the whole chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetBlocksPayload {
    pub from_block_hash: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlocksPayload {
    pub blocks: Vec<Block>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;

    #[test]
    fn test_command_wire_names() {
        assert_eq!(
            serde_json::to_string(&Command::GetTransactions).unwrap(),
            "\"GET_TRANSACTIONS\""
        );
        assert_eq!(serde_json::to_string(&Command::Ping).unwrap(), "\"PING\"");
    }

    #[test]
    fn test_envelope_round_trip() {
        let payload = VersionPayload {
            version: 1,
            block_height: 4,
        };
        let message = Message::new(Command::Version, &payload, 3100).unwrap();
        let bytes = message.encode().unwrap();

        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded.command, Command::Version);
        assert_eq!(decoded.from_port, 3100);

        let decoded_payload: VersionPayload = decoded.decode_payload().unwrap();
        assert_eq!(decoded_payload.version, 1);
        assert_eq!(decoded_payload.block_height, 4);
    }

    #[test]
    fn test_trailing_whitespace_tolerated() {
        let message = Message::new(Command::Ping, &EmptyPayload {}, 3100).unwrap();
        let mut bytes = message.encode().unwrap();
        bytes.extend(b"  \n\t ");
        assert!(Message::decode(&bytes).is_ok());
    }

    #[test]
    fn test_extra_keys_rejected() {
        let raw = r#"{"command":"PING","payload":"{}","from_port":3100,"extra":1}"#;
        assert!(Message::decode(raw.as_bytes()).is_err());

        let message = Message {
            command: Command::Version,
            payload: r#"{"version":1,"block_height":0,"bonus":true}"#.to_string(),
            from_port: 3100,
        };
        assert!(message.decode_payload::<VersionPayload>().is_err());
    }

    #[test]
    fn test_transactions_payload_round_trip() {
        let tx = Transaction::new_coinbase([5; 32], 1_000_000, 1_700_000_000).unwrap();
        let payload = TransactionsPayload {
            transactions: vec![tx.clone()],
        };
        let message = Message::new(Command::Transactions, &payload, 2001).unwrap();

        let decoded: TransactionsPayload = Message::decode(&message.encode().unwrap())
            .unwrap()
            .decode_payload()
            .unwrap();
        assert_eq!(decoded.transactions.len(), 1);
        assert_eq!(decoded.transactions[0].hash(), tx.hash());
    }
}
