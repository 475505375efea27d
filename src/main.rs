//! Command-line driver: compile a Brainfuck source file and run it against
//! a zeroed tape with the standard-stream capabilities.

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use bfjit::CompiledProgram;

#[derive(Parser)]
#[command(
    version,
    about = "Compile a Brainfuck program to x86-64 machine code and run it"
)]
struct Args {
    /// Brainfuck source file.
    program: PathBuf,

    /// Tape size in bytes. The compiled code performs no bounds checks, so
    /// the program must fit its pointer movement within this arena.
    #[arg(long, default_value_t = 30_000)]
    tape_size: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let source = fs::read_to_string(&args.program)?;
    match CompiledProgram::compile(&source) {
        Ok(program) => {
            let mut tape = vec![0u8; args.tape_size];
            unsafe { program.run(&mut tape) };
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
