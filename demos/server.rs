use anyhow::{bail, Result};
use dbus_wire::object_path::ObjectPath;
use dbus_wire::ty::DBusType;
use dbus_wire::{Body, BodyBuf, CallContext, ClaimOptions, ConnectionBuilder};

const NAME: &str = "se.tedro.DBusExample";
const INTERFACE: &str = "se.tedro.DBusExample.Pingable";
const PATH: &ObjectPath = ObjectPath::new_const("/se/tedro/DBusExample");

#[tokio::main]
async fn main() -> Result<()> {
    let c = ConnectionBuilder::new().session_bus().build().await?;

    c.register_handler(PATH, INTERFACE, "Ping", handle_ping);

    let mut claim = c.claim(NAME, ClaimOptions::new().no_queue(true)).await?;

    match claim.recv().await {
        Some(true) => {}
        _ => bail!("could not acquire name {NAME}"),
    }

    dbg!(c.local_name());

    while let Some(owner) = claim.recv().await {
        dbg!(owner);
    }

    Ok(())
}

fn handle_ping(_ctx: &CallContext, mut body: Body<'_>) -> dbus_wire::Result<BodyBuf> {
    let value = u32::decode(&mut body)?;
    let mut reply = BodyBuf::new();
    reply.store_u32(value);
    Ok(reply)
}
