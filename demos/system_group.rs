//! System group demo
//!
//! Reads sysDescr, sets sysContact with the write community, then walks the
//! system subtree.
//!
//! Run with: cargo run --example system_group -- 127.0.0.1:11161
//!
//! Test against net-snmp:
//!   snmpd -f -Lo --rocommunity=public --rwcommunity=private udp:11161

use snmp_manager::{Error, ErrorStatus, Session, SessionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("snmp_manager=info".parse()?),
        )
        .init();

    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let session = Session::connect(SessionConfig::new(address)).await?;
    println!("Agent {}", session.read_target().addr());

    println!("\n--- GET sysDescr.0 ---");
    let descr = session.get("1.3.6.1.2.1.1.1.0").await?;
    println!("{descr}");

    println!("\n--- SET sysContact.0 ---");
    match session.set("1.3.6.1.2.1.1.4.0", "admin@example.com").await {
        Ok(()) => println!("updated"),
        Err(e) => match *e {
            Error::Snmp {
                status: ErrorStatus::NoAccess | ErrorStatus::NotWritable | ErrorStatus::ReadOnly,
                ..
            } => println!("agent refused the write: {e}"),
            _ => return Err(e.into()),
        },
    }

    println!("\n--- WALK system ---");
    let mut walk = session.walk("1.3.6.1.2.1.1")?;
    while let Some(vb) = walk.next().await {
        println!("{}", vb?);
    }

    session.close();
    Ok(())
}
