// bin/cli.rs - FIPA ACL CLI Tool
//
//! FIPA ACL Command Line Interface
//!
//! Encode and decode bit-efficient ACL messages, or watch a protocol
//! conversation run between in-process agents.
//!
//! # Usage
//!
//! ```bash
//! # Encode a message to hex
//! fipa-acl encode --performative request --sender a --receiver b --content "(open door)"
//!
//! # Decode hex back into a message
//! fipa-acl decode fa1302... --json
//!
//! # Run a complete conversation
//! fipa-acl demo contract-net
//! ```

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use fipa_acl_engine::acl_message::{AclMessage, AgentAddress, ConversationId, Performative};
use fipa_acl_engine::config::{EngineConfig, ProtocolSettings};
use fipa_acl_engine::encoding::{AclCodec, BitEfficientCodec};
use fipa_acl_engine::observability::init_tracing;
use fipa_acl_engine::platform::{AclHost, LocalPlatform};
use fipa_acl_engine::protocol::{
    ContractNetProtocol, InteractionProtocol, ProposeProtocol, QueryProtocol, RequestProtocol,
};

/// FIPA ACL CLI Tool
#[derive(Parser, Debug)]
#[command(name = "fipa-acl")]
#[command(version)]
#[command(about = "FIPA ACL bit-efficient codec and protocol demo")]
#[command(long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log verbosely (tracing at debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode a message and print it as hex
    Encode(EncodeArgs),

    /// Decode a hex encoded message
    Decode {
        /// Hex bytes, whitespace allowed
        hex: String,

        /// Print the message as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a conversation between local agents
    Demo {
        #[arg(value_enum)]
        protocol: DemoProtocol,
    },
}

#[derive(clap::Args, Debug)]
struct EncodeArgs {
    /// Performative (inform, request, query-ref, cfp, ...)
    #[arg(short, long, default_value = "inform")]
    performative: String,

    #[arg(short, long)]
    sender: Option<String>,

    /// Receiver address, repeat for several
    #[arg(short, long)]
    receiver: Vec<String>,

    #[arg(long)]
    content: Option<String>,

    #[arg(long)]
    language: Option<String>,

    #[arg(long)]
    encoding: Option<String>,

    #[arg(long)]
    ontology: Option<String>,

    #[arg(long)]
    protocol: Option<String>,

    #[arg(long)]
    conversation_id: Option<String>,

    #[arg(long)]
    reply_with: Option<String>,

    #[arg(long)]
    in_reply_to: Option<String>,

    /// User parameter as key=value, repeat for several
    #[arg(long = "param")]
    params: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DemoProtocol {
    Query,
    Propose,
    Request,
    ContractNet,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    let config = EngineConfig::load_with_env(args.config.as_deref())
        .context("Failed to load configuration")?;

    let logging = if args.verbose {
        config.logging.clone().verbose()
    } else {
        config.logging.clone()
    };
    init_tracing(logging).map_err(|e| anyhow!("Failed to initialize tracing: {e}"))?;

    match &args.command {
        Commands::Encode(encode) => cmd_encode(encode),
        Commands::Decode { hex, json } => cmd_decode(hex, *json),
        Commands::Demo { protocol } => cmd_demo(*protocol, &config),
    }
}

// =============================================================================
// Codec Commands
// =============================================================================

fn cmd_encode(args: &EncodeArgs) -> Result<()> {
    let performative = Performative::from_fipa_name(&args.performative);
    if performative == Performative::None && !args.performative.eq_ignore_ascii_case("none") {
        bail!("Unknown performative: {}", args.performative);
    }

    let mut message = AclMessage {
        performative,
        sender: args.sender.as_deref().map(AgentAddress::from),
        receivers: args.receiver.iter().map(|r| AgentAddress::from(r.as_str())).collect(),
        content: args.content.clone().unwrap_or_default().into_bytes(),
        language: args.language.clone(),
        encoding: args.encoding.clone(),
        ontology: args.ontology.clone(),
        protocol: args.protocol.clone(),
        conversation_id: args.conversation_id.as_deref().map(ConversationId::from),
        reply_with: args.reply_with.clone(),
        in_reply_to: args.in_reply_to.clone(),
        ..Default::default()
    };
    for param in &args.params {
        let (key, value) = param
            .split_once('=')
            .ok_or_else(|| anyhow!("User parameter must be key=value: {param}"))?;
        message.user_parameters.insert(key.to_string(), value.to_string());
    }

    let bytes = BitEfficientCodec::new()
        .encode(&message)
        .context("Failed to encode message")?;
    println!("{}", hex::encode(&bytes));
    eprintln!("{} {} bytes", "Encoded:".green().bold(), bytes.len());
    Ok(())
}

fn cmd_decode(input: &str, json: bool) -> Result<()> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&cleaned).context("Input is not valid hex")?;
    let message = BitEfficientCodec::new()
        .decode(&bytes)
        .context("Failed to decode message")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        print_message(&message);
    }
    Ok(())
}

fn print_message(message: &AclMessage) {
    println!("{} {}", "Performative:".bold(), message.performative.to_string().cyan());
    if let Some(sender) = &message.sender {
        println!("  {} {}", "Sender:".bold(), sender);
    }
    if !message.receivers.is_empty() {
        let receivers: Vec<&str> = message.receivers.iter().map(|r| r.as_str()).collect();
        println!("  {} {}", "Receivers:".bold(), receivers.join(", "));
    }
    if !message.content.is_empty() {
        match message.content_str() {
            Some(text) => println!("  {} {}", "Content:".bold(), text),
            None => println!("  {} 0x{}", "Content:".bold(), hex::encode(&message.content)),
        }
    }
    let optional = [
        ("Reply-With:", message.reply_with.as_deref()),
        ("In-Reply-To:", message.in_reply_to.as_deref()),
        ("Language:", message.language.as_deref()),
        ("Encoding:", message.encoding.as_deref()),
        ("Ontology:", message.ontology.as_deref()),
        ("Protocol:", message.protocol.as_deref()),
        ("Conversation:", message.conversation_id.as_ref().map(|c| c.as_str())),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            println!("  {} {}", label.bold(), value);
        }
    }
    if let Some(reply_by) = &message.reply_by {
        println!("  {} {:?} {:?}", "Reply-By:".bold(), reply_by.relation, reply_by.time);
    }
    for (key, value) in &message.user_parameters {
        println!("  {} {}", format!("{key}:").bold(), value);
    }
}

// =============================================================================
// Demo Conversations
// =============================================================================

fn cmd_demo(protocol: DemoProtocol, config: &EngineConfig) -> Result<()> {
    let platform = Arc::new(LocalPlatform::new());
    let settings = &config.protocol;
    let agent = |name: &str| -> Arc<dyn AclHost> { Arc::new(platform.agent(name, &config.agent)) };

    println!("{} {:?}", "Demo:".bold().cyan(), protocol);
    println!("{}", "─".repeat(40));

    let finished = match protocol {
        DemoProtocol::Query => demo_query(agent("asker"), agent("oracle"), settings)?,
        DemoProtocol::Propose => demo_propose(agent("buyer"), agent("seller"), settings)?,
        DemoProtocol::Request => demo_request(agent("client"), agent("server"), settings)?,
        DemoProtocol::ContractNet => demo_contract_net(&agent, settings)?,
    };

    for (name, state, errors) in finished {
        let state = if errors == 0 {
            state.green()
        } else {
            state.red()
        };
        println!("  {:<10} {} ({} errors)", name.bold(), state, errors);
    }
    Ok(())
}

type Summary = Vec<(String, String, usize)>;

fn summarize(name: &str, protocol: &dyn InteractionProtocol) -> (String, String, usize) {
    (
        name.to_string(),
        protocol.state().to_string(),
        protocol.errors().len(),
    )
}

fn step(label: &str) {
    println!("  {} {}", "→".yellow(), label);
}

fn demo_query(
    asker: Arc<dyn AclHost>,
    oracle: Arc<dyn AclHost>,
    settings: &ProtocolSettings,
) -> Result<Summary> {
    let mut initiator = QueryProtocol::new(asker, settings);
    initiator.initiate("asker".into(), "oracle".into())?;
    let mut participant = QueryProtocol::new(oracle, settings);
    participant.initiate_as_participant()?;

    step("asker sends query-ref");
    initiator.query("(iota ?x (capital france ?x))", Performative::QueryRef)?;
    participant
        .get_query()
        .context("oracle did not receive the query")?;
    step("oracle agrees and informs");
    participant.agree("")?;
    participant.inform("paris")?;

    initiator.get_answer().context("missing agree")?;
    let result = initiator.get_result().context("missing inform")?;
    step(&format!("asker learns {}", result.content_str().unwrap_or("?")));

    Ok(vec![
        summarize("asker", &initiator),
        summarize("oracle", &participant),
    ])
}

fn demo_propose(
    buyer: Arc<dyn AclHost>,
    seller: Arc<dyn AclHost>,
    settings: &ProtocolSettings,
) -> Result<Summary> {
    let mut initiator = ProposeProtocol::new(seller, settings);
    initiator.initiate("seller".into(), "buyer".into())?;
    let mut participant = ProposeProtocol::new(buyer, settings);
    participant.initiate_as_participant()?;

    step("seller proposes a price");
    initiator.propose("(sell lamp 20)")?;
    participant.get_propose().context("buyer missed the proposal")?;
    step("buyer accepts");
    participant.accept("")?;
    initiator.get_answer().context("missing answer")?;

    Ok(vec![
        summarize("seller", &initiator),
        summarize("buyer", &participant),
    ])
}

fn demo_request(
    client: Arc<dyn AclHost>,
    server: Arc<dyn AclHost>,
    settings: &ProtocolSettings,
) -> Result<Summary> {
    let mut initiator = RequestProtocol::new(client, settings);
    initiator.initiate("client".into(), "server".into())?;
    let mut participant = RequestProtocol::new(server, settings);
    participant.initiate_as_participant()?;

    step("client requests an action");
    initiator.request("(action server (backup /var))")?;
    participant.get_request().context("server missed the request")?;
    step("server agrees and reports the result");
    participant.agree("")?;
    participant.inform_result("backup-0042")?;

    initiator.get_answer().context("missing agree")?;
    initiator.get_result().context("missing result")?;

    Ok(vec![
        summarize("client", &initiator),
        summarize("server", &participant),
    ])
}

fn demo_contract_net(
    agent: &dyn Fn(&str) -> Arc<dyn AclHost>,
    settings: &ProtocolSettings,
) -> Result<Summary> {
    const BIDS: [(&str, Option<u32>); 3] = [("carrier-1", Some(120)), ("carrier-2", Some(95)), ("carrier-3", None)];

    let bidders: Vec<AgentAddress> = BIDS.iter().map(|(name, _)| AgentAddress::from(*name)).collect();
    let mut manager = ContractNetProtocol::new(agent("manager"), settings);
    manager.initiate_with("manager".into(), &bidders)?;

    let mut participants = Vec::new();
    for (name, _) in BIDS {
        let mut participant = ContractNetProtocol::new(agent(name), settings);
        participant.initiate_as_participant()?;
        participants.push(participant);
    }

    step("manager issues cfp");
    manager.cfp("(transport crate-7 lyon)")?;
    for (participant, (name, price)) in participants.iter_mut().zip(BIDS) {
        participant.get_cfp().with_context(|| format!("{name} missed the cfp"))?;
        match price {
            Some(price) => {
                step(&format!("{name} bids {price}"));
                participant.propose(format!("(price {price})"))?;
            }
            None => {
                step(&format!("{name} refuses"));
                participant.refuse("(busy)")?;
            }
        }
    }

    manager.get_proposals();
    let winner = BIDS
        .iter()
        .filter_map(|(name, price)| price.map(|p| (*name, p)))
        .min_by_key(|(_, price)| *price)
        .map(|(name, _)| AgentAddress::from(name))
        .context("no bids")?;
    let losers: Vec<AgentAddress> = manager
        .open_proposals()
        .map(|bid| bid.bidder.clone())
        .filter(|bidder| *bidder != winner)
        .collect();

    step(&format!("manager awards {winner}"));
    manager.accept_proposal(&winner, "(go)")?;
    for loser in &losers {
        manager.reject_proposal(loser, "(outbid)")?;
    }

    for participant in participants.iter_mut() {
        if participant.is_finished() {
            continue;
        }
        if let Some(answer) = participant.get_answer()
            && answer.performative == Performative::AcceptProposal
        {
            participant.inform("(delivered crate-7)")?;
        }
    }
    manager.get_results();

    let mut summary = vec![summarize("manager", &manager)];
    for (participant, (name, _)) in participants.iter().zip(BIDS) {
        summary.push(summarize(name, participant));
    }
    Ok(summary)
}
