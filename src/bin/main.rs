use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use classpatch::opcode::{Categories, OpcodeTable};
use classpatch::{flow, scanner, switches};

#[derive(Parser)]
#[command(name = "classpatch")]
#[command(about = "Inspect and analyze raw stack-machine bytecode")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the instruction catalog
    Catalog {
        /// Only list opcodes carrying this category (e.g. jump, cp-index)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Mark the instruction boundaries of a raw code file
    Boundaries {
        /// File holding raw bytecode
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Trace the control-flow paths from an offset of a raw code file
    Flow {
        /// File holding raw bytecode
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Offset to trace from
        #[arg(short, long, default_value_t = 0)]
        start: usize,
    },

    /// Decode the switch instruction at an offset of a raw code file
    Switch {
        /// File holding raw bytecode
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Offset of the switch opcode byte
        #[arg(short, long)]
        at: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Catalog { category } => dump_catalog(category.as_deref())?,
        Commands::Boundaries { input } => dump_boundaries(input)?,
        Commands::Flow { input, start } => dump_flow(input, *start)?,
        Commands::Switch { input, at } => dump_switch(input, *at)?,
    }

    Ok(())
}

fn parse_category(name: &str) -> Result<Categories> {
    let cats = match name.to_ascii_lowercase().as_str() {
        "jump" => Categories::JUMP,
        "condition" => Categories::CONDITION,
        "return" => Categories::RETURN,
        "throw" => Categories::THROW,
        "cp-index" => Categories::CP_INDEX,
        "var-load" => Categories::VAR_LOAD,
        "var-store" => Categories::VAR_STORE,
        "array-load" => Categories::ARRAY_LOAD,
        "array-store" => Categories::ARRAY_STORE,
        "math-op" => Categories::MATH_OP,
        "type-convert" => Categories::TYPE_CONVERT,
        "stack-manipulate" => Categories::STACK_MANIPULATE,
        other => anyhow::bail!("unknown category: {other}"),
    };
    Ok(cats)
}

fn dump_catalog(category: Option<&str>) -> Result<()> {
    let table = OpcodeTable::global();
    let filter = category.map(parse_category).transpose()?;
    for info in table.opcodes_with(filter.unwrap_or_else(Categories::empty)) {
        println!(
            "0x{:02x}  {:<16} operands: {:>2}  categories: {:?}",
            info.opcode, info.mnemonic, info.operand_count, info.categories
        );
    }
    Ok(())
}

fn dump_boundaries(input: &PathBuf) -> Result<()> {
    let code = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    scanner::for_each_instruction(&code, |info, at, operands| {
        println!("{at:>6}  {:<16} {operands:?}", info.mnemonic);
        Ok(())
    })
    .with_context(|| "walking instructions")?;
    Ok(())
}

fn dump_flow(input: &PathBuf, start: usize) -> Result<()> {
    let code = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let path = flow::trace_from(&code, start).with_context(|| format!("tracing from {start}"))?;
    println!("{}", flow::flow_path_to_string(&code, &path));
    if let Some(max) = path.max_offset() {
        println!("max reachable offset: {max}");
    }
    Ok(())
}

fn dump_switch(input: &PathBuf, at: usize) -> Result<()> {
    let code = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let sw = switches::decode_at(&code, at).with_context(|| format!("decoding switch at {at}"))?;

    println!("{} at {at}, {} bytes encoded", sw.kind.mnemonic(), sw.encoded_len());
    for arm in sw.arms() {
        let label = match arm.match_value {
            Some(v) => format!("case {v}"),
            None => "default".to_string(),
        };
        let end = match arm.end_target {
            Some(t) => format!(", ends by jumping to {t}"),
            None => String::new(),
        };
        println!(
            "  {label}: -> {}  flow: {}{end}",
            arm.target,
            flow::flow_path_to_string(&code, &arm.flow)
        );
    }
    match sw.convergence() {
        Some(offset) => println!("arms converge at {offset}"),
        None => println!("arms do not converge"),
    }
    Ok(())
}
