fn main() {
    std::process::exit(pcq::app::startup::startup());
}
