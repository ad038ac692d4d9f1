fn main() {
    flaw_nozzle::cli::run();
}
