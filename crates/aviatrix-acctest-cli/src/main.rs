#![forbid(unsafe_code)]

fn main() {
    aviatrix_acctest_core::init_tracing("warn");
    std::process::exit(aviatrix_acctest_cli::run());
}
