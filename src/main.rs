use std::io::Write;

use cosylaunch::{menu, utils};

#[tokio::main]
async fn main() {
    utils::logger::init_logger();

    let choice = {
        let stdin = std::io::stdin();
        let mut lock = stdin.lock();
        print!("{}", menu::render_menu());
        let _ = std::io::stdout().flush();
        menu::read_choice(&mut lock)
    };

    let ok = menu::dispatch(choice).await;
    std::process::exit(if ok { 0 } else { 1 });
}
