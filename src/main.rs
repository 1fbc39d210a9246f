// CLI entry point: thin command handlers over the node library.
use clap::Parser;
use data_encoding::HEXLOWER;
use hubchain::{
    BlockStore, Chain, Command, Hash, Message, Node, NodeConfig, Opt, TransactionsPayload,
    Wallet, Wallets, GLOBAL_CONFIG,
};
use log::{error, warn, LevelFilter};
use std::net::ToSocketAddrs;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::CreateWallet { name } => {
            let mut wallets = Wallets::new()?;
            let address = wallets.generate_keypair(&name, true)?.get_address();
            println!("Created wallet {name} with address {}", HEXLOWER.encode(&address));
        }
        Command::ListWallets => {
            let wallets = Wallets::new()?;
            for name in wallets.get_names() {
                let wallet = wallets
                    .load_keypair(&name)
                    .expect("listed names always resolve");
                println!("{name}  {}", HEXLOWER.encode(&wallet.get_address()));
            }
        }
        Command::Balance { name } => {
            let wallets = Wallets::new()?;
            let wallet = lookup_wallet(&wallets, &name)?;
            let chain = open_chain()?;
            println!("{}", chain.balance(&wallet.get_address())?);
        }
        Command::Payments { name } => {
            let wallets = Wallets::new()?;
            let wallet = lookup_wallet(&wallets, &name)?;
            let chain = open_chain()?;
            for payment in chain.payments(wallet.get_public_key())? {
                let from = match payment.from {
                    Some(address) => HEXLOWER.encode(&address),
                    None => "coinbase".to_string(),
                };
                println!(
                    "{}  {} -> {}  value {}",
                    HEXLOWER.encode(&payment.tx_hash),
                    from,
                    HEXLOWER.encode(&payment.to),
                    payment.value
                );
            }
        }
        Command::Send { from, to, value } => {
            let wallets = Wallets::new()?;
            let wallet = lookup_wallet(&wallets, &from)?;
            let recipient = parse_address(&to)?;

            let config = cli_node_config(false, None);
            let node = Node::new(config.clone(), open_chain()?);
            let tx = node.create_transaction(wallet, recipient, value)?;

            // An unconnected node knows no peers, so hand the gossip to
            // the hub directly.
            gossip_to_central(&config, Message::new(
                hubchain::WireCommand::Transactions,
                &TransactionsPayload {
                    transactions: vec![tx.clone()],
                },
                config.listen_port,
            )?);
            println!("Sent transaction {}", HEXLOWER.encode(&tx.hash()));
        }
        Command::Mine { name } => {
            let wallets = Wallets::new()?;
            let wallet = lookup_wallet(&wallets, &name)?;

            let config = cli_node_config(false, None);
            let node = Node::new(config.clone(), open_chain()?);
            let block = node.mine_block(wallet.get_address())?;

            gossip_to_central(&config, Message::new(
                hubchain::WireCommand::Blocks,
                &hubchain::BlocksPayload {
                    blocks: vec![block.clone()],
                },
                config.listen_port,
            )?);
            println!("Mined block {}", HEXLOWER.encode(block.get_hash()));
        }
        Command::PrintChain => {
            let chain = open_chain()?;
            for (height, block) in chain.blocks(None)?.iter().enumerate() {
                println!(
                    "height {height}  hash {}  prev {}  timestamp {}  transactions {}",
                    HEXLOWER.encode(block.get_hash()),
                    HEXLOWER.encode(block.get_previous_hash()),
                    block.get_timestamp(),
                    block.get_transactions().len()
                );
            }
        }
        Command::Supply => {
            let chain = open_chain()?;
            println!("height {}", chain.block_height()?);
            println!("supply {}", chain.circulating_supply()?);
            println!("next block reward {}", chain.current_block_reward()?);
        }
        Command::StartNode { central, port } => {
            let config = cli_node_config(central, port);
            let chain = open_chain_with_difficulty(config.difficulty)?;
            let node = Node::new(config, chain);
            node.connect()?;
            println!("Node running; press Ctrl-C to stop");
            loop {
                thread::sleep(Duration::from_secs(1));
            }
        }
        Command::ClearState => {
            let chain = open_chain()?;
            chain.clear_state()?;
            println!("Done!");
        }
    }
    Ok(())
}

fn store_path() -> PathBuf {
    GLOBAL_CONFIG
        .get_store_path()
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn open_chain() -> Result<Chain, Box<dyn std::error::Error>> {
    open_chain_with_difficulty(hubchain::config::settings::DEFAULT_DIFFICULTY)
}

fn open_chain_with_difficulty(difficulty: u32) -> Result<Chain, Box<dyn std::error::Error>> {
    let store = BlockStore::open(&store_path())?;
    Ok(Chain::new(store, difficulty))
}

fn cli_node_config(central: bool, port: Option<u16>) -> NodeConfig {
    let mut config = if central {
        NodeConfig::central(store_path())
    } else {
        let listen_port = port
            .or_else(|| GLOBAL_CONFIG.get_node_port())
            .unwrap_or(0);
        NodeConfig::peer(listen_port, store_path())
    };
    config.central_host = GLOBAL_CONFIG.get_central_host();
    config.central_port = GLOBAL_CONFIG.get_central_port();
    if central {
        config.listen_port = config.central_port;
    }
    config
}

fn lookup_wallet<'a>(
    wallets: &'a Wallets,
    name: &str,
) -> Result<&'a Wallet, Box<dyn std::error::Error>> {
    wallets
        .load_keypair(name)
        .ok_or_else(|| format!("No wallet named {name}").into())
}

fn parse_address(hex: &str) -> Result<Hash, Box<dyn std::error::Error>> {
    let bytes = HEXLOWER
        .decode(hex.as_bytes())
        .map_err(|e| format!("Invalid address encoding: {e}"))?;
    if bytes.len() != 32 {
        return Err("Addresses are 32 bytes (64 hex characters)".into());
    }
    let mut address = [0u8; 32];
    address.copy_from_slice(&bytes);
    Ok(address)
}

/// Best-effort delivery to the hub; gossip failures never fail the
/// command.
fn gossip_to_central(config: &NodeConfig, message: Message) {
    let central = match config.central_addr().to_socket_addrs() {
        Ok(mut addrs) => addrs.next(),
        Err(e) => {
            warn!("Cannot resolve central node: {e}");
            return;
        }
    };
    let Some(central) = central else {
        warn!("Central node address resolves to nothing");
        return;
    };
    if let Err(e) = hubchain::send_once(central, &message) {
        warn!("Could not reach the central node: {e}");
    }
}
