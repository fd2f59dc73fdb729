mod cli;
mod commands;
mod env_loader;
mod error;
mod logging;
mod shed;

fn main() {
    env_loader::load_dotenv();
    logging::init();

    if let Err(err) = cli::run() {
        match error::find_shed_error(&err) {
            Some(shed_err) => eprintln!("error[{}]: {err:#}", shed_err.code().as_str()),
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}
