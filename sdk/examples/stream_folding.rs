//! Example demonstrating how a UI folds streamed agent chunks

use sdk::aggregators::{append_string, collect, fold, last};
use sdk::Message;

fn main() {
    // Example 1: Rebuilding a full reply from token chunks
    let chunks = ["Here is ", "the BRD draft.", "\nNEXT: SA"];
    let reply = fold(chunks, append_string()).unwrap_or_default();
    println!("Reply: {}", reply);

    // Example 2: Tracking only the latest status line
    let status = fold(["PM speaking", "SA speaking", "PG speaking"], last());
    println!("Status: {:?}", status);

    // Example 3: Keeping every message for a transcript view
    let transcript = fold(
        [Message::user("I need an invoice OCR tool"), Message::from_agent("PM", reply)],
        collect(),
    )
    .unwrap_or_default();

    for message in &transcript {
        println!("[{}] {}", message.author().unwrap_or(&message.role.to_string()), message.text);
    }
}
