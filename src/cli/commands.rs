use clap::{Parser, Subcommand};

/// Command-line front-end over the node library.
#[derive(Parser)]
#[command(name = "hubchain", about = "Educational UTXO blockchain node")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a named key pair in the keystore
    CreateWallet {
        /// Name the key pair is stored under
        name: String,
    },
    /// List the names in the keystore
    ListWallets,
    /// Show the balance of a named wallet
    Balance {
        /// Wallet name
        name: String,
    },
    /// Show payment history for a named wallet
    Payments {
        /// Wallet name
        name: String,
    },
    /// Send coins from a named wallet to a recipient address
    Send {
        /// Sender wallet name
        from: String,
        /// Recipient address (64 hex characters)
        to: String,
        /// Amount in base units
        value: u64,
    },
    /// Mine one block rewarding a named wallet
    Mine {
        /// Miner wallet name
        name: String,
    },
    /// Print every block, oldest first
    PrintChain,
    /// Show chain height and circulating supply
    Supply,
    /// Run a node until interrupted
    StartNode {
        /// Run as the central hub instead of a peer
        #[arg(long)]
        central: bool,
        /// Listening port (peers only; the hub uses the central port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Wipe the chain, mempool, and UTXO index
    ClearState,
}
