mod api;
mod gui;
mod mesh;

use std::sync::Arc;

use gui::app;

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => Arc::new(rt),
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    app::main(rt);
}
