fn main() {
    use archmodel_tosca::cli::parse;
    let cli = parse();
    archmodel_tosca::utils::logging::init(cli.verbose, cli.quiet);
    let code = archmodel_tosca::app::run_cli(cli);
    if code != 0 {
        std::process::exit(code);
    }
}
