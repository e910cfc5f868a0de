fn main() {
    #[cfg(target_arch = "wasm32")]
    bazari_frontend::start();
}
