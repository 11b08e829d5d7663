use std::fs;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ir_listing::parser::lexer;
use ir_listing::{ListingError, Program, locate};

#[derive(Parser)]
#[command(name = "listing")]
#[command(about = "Reader for textual control-flow-graph listings", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Читает листинг и печатает форму графа
    Parse {
        /// Файл листинга
        input: String,

        /// Показать токены
        #[arg(long)]
        show_tokens: bool,

        /// Показать весь граф
        #[arg(long)]
        show_program: bool,
    },

    /// Только токенизация
    Tokens {
        /// Файл листинга
        input: String,
    },
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { input, show_tokens, show_program } => {
            println!("Parsing {}...", input);
            let source = fs::read_to_string(&input)?;

            if show_tokens {
                println!("=== TOKENS ===");
                if let Err(e) = print_tokens(&source) {
                    report(&input, &source, &e);
                    return Ok(ExitCode::FAILURE);
                }
            }

            match ir_listing::parse(&source) {
                Ok(program) => {
                    print_summary(&program);
                    if show_program {
                        println!("=== PROGRAM ===");
                        println!("{:#?}", program);
                    }
                }
                Err(e) => {
                    report(&input, &source, &e);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Tokens { input } => {
            let source = fs::read_to_string(&input)?;
            if let Err(e) = print_tokens(&source) {
                report(&input, &source, &e);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_tokens(source: &str) -> Result<(), ListingError> {
    for token in lexer::Lexer::new(source) {
        let token = token?;
        println!("{:>6}: {:?}", token.offset(), token.kind);
    }
    Ok(())
}

fn print_summary(program: &Program) {
    println!("Variables: {}", program.variable_count());
    println!("Blocks: {}", program.basic_block_count());
    for block in program.basic_blocks() {
        let kinds: Vec<_> = block.instructions().iter().map(|insn| insn.kind_name()).collect();
        println!(
            "  ${} #{}: {} phi, {} instructions [{}]",
            block.label,
            block.index.index(),
            block.phis().len(),
            kinds.len(),
            kinds.join(", ")
        );
    }
}

fn report(input: &str, source: &str, error: &ListingError) {
    let location = locate(source, error.offset());
    eprintln!(
        "{}: Parse error at [{}; {}]: {}",
        input,
        location.row + 1,
        location.column + 1,
        error.message()
    );
}
