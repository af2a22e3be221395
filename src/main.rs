fn main() {
    std::process::exit(drbanana_lib::run());
}
