fn main() {
    let code = monk::run_cli();
    if code != 0 {
        std::process::exit(code);
    }
}
