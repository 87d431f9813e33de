fn main() {
    if let Err(e) = userdir::run() {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        std::process::exit(if e.is_caller_error() { 2 } else { 1 });
    }
}
