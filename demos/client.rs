use anyhow::{bail, Result};
use dbus_wire::object_path::ObjectPath;
use dbus_wire::ty::DBusType;
use dbus_wire::{BodyBuf, ConnectionBuilder};

const NAME: &str = "se.tedro.DBusExample";
const INTERFACE: &str = "se.tedro.DBusExample.Pingable";
const PATH: &ObjectPath = ObjectPath::new_const("/se/tedro/DBusExample");

#[tokio::main]
async fn main() -> Result<()> {
    let c = ConnectionBuilder::new().session_bus().build().await?;

    let mut body = BodyBuf::new();
    body.store_u32(42);

    let reply = c.call(NAME, PATH, INTERFACE, "Ping", body).await;

    let reply = match reply {
        Ok(reply) => reply,
        Err(error) => match error.call_name() {
            Some(name) => bail!("{name}: {error}"),
            None => bail!(error),
        },
    };

    let value = u32::decode(&mut reply.body())?;
    dbg!(value);
    Ok(())
}
