fn main() {
    docrun::cli::run();
}
