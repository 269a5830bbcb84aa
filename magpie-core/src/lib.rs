pub mod harvest;
pub mod history;
pub mod report;

use colored::Colorize;

pub fn print_banner() {
    let banner = r#"
    ███╗   ███╗ █████╗  ██████╗ ██████╗ ██╗███████╗
    ████╗ ████║██╔══██╗██╔════╝ ██╔══██╗██║██╔════╝
    ██╔████╔██║███████║██║  ███╗██████╔╝██║█████╗
    ██║╚██╔╝██║██╔══██║██║   ██║██╔═══╝ ██║██╔══╝
    ██║ ╚═╝ ██║██║  ██║╚██████╔╝██║     ██║███████╗
    ╚═╝     ╚═╝╚═╝  ╚═╝ ╚═════╝ ╚═╝     ╚═╝╚══════╝
"#;
    println!("{}", banner.bright_cyan());
    println!(
        "{}",
        format!(
            "    v{} - incremental media harvesting with durable dedup",
            env!("CARGO_PKG_VERSION")
        )
        .bright_black()
    );
    println!();
}
