fn main() {
    if let Err(err) = flowgraph_editor::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
