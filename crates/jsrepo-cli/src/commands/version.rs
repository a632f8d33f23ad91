use jsrepo_core::version::version_string;
use jsrepo_core::VERSION;
use miette::Result;

pub fn run(json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "version": VERSION,
                "display": version_string()
            })
        );
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
