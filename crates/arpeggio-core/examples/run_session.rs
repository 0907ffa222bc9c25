//! Drive one session from the library: press a few arpeggios, print the
//! stack and the keyboard table after each dispatch.
//!
//! Usage: cargo run -p arpeggio-core --example run_session

use arpeggio_core::{KeyOutcome, Keyboard, MemoryLog};
use std::process;

fn main() {
    let alphabet: Vec<char> = "jfkdls".chars().collect();
    let mut keyboard = Keyboard::new(alphabet, MemoryLog::new()).unwrap_or_else(|e| {
        eprintln!("start session: {e}");
        process::exit(1);
    });

    // Compute 2 * 2: the empty-stack table maps single keys to the literals,
    // and the table reshapes itself after every dispatch.
    for plan in ["zero", "succ", "succ", "dup", "mul"] {
        let key = keyboard
            .code_rows()
            .into_iter()
            .find(|row| row.operation == plan)
            .map(|row| row.key)
            .unwrap_or_else(|| {
                eprintln!("{plan} is not legal here");
                process::exit(1);
            });

        for symbol in key.chars() {
            match keyboard.key(symbol) {
                Ok(KeyOutcome::Dispatched { operation, .. }) => {
                    println!("{key} -> {operation}");
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("dispatch: {e}");
                    process::exit(1);
                }
            }
        }
    }

    let stack: Vec<String> = keyboard.stack().iter().map(|v| v.display_string()).collect();
    println!("stack: [{}]", stack.join(", "));
    println!("keyboard:");
    for row in keyboard.code_rows() {
        println!("  {:<6} {:<10} {}", row.key, row.operation, row.weight);
    }
}
