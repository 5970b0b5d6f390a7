//! Standalone rescue helper. See `core_rescue::child` for the contract.

fn main() {
    std::process::exit(core_rescue::child::run_child());
}
