pub mod cli;
pub mod flatten;
pub mod jq;
pub mod model;
pub mod reader;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.run()
}
