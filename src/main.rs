#[cfg(any(target_arch = "wasm32", test))]
mod clipboard;
#[cfg(any(target_arch = "wasm32", test))]
mod config;
#[cfg(any(target_arch = "wasm32", test))]
mod dom;
#[cfg(any(target_arch = "wasm32", test))]
mod interactions;
mod logging;

#[cfg(target_arch = "wasm32")]
mod frontend;
#[cfg(not(target_arch = "wasm32"))]
mod server;
#[cfg(test)]
mod testing;

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() {
    if let Err(error) = server::run().await {
        eprintln!("server failed: {error}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    frontend::run();
}
