use anyhow::{bail, Result};
use dbus_wire::object_path::ObjectPath;
use dbus_wire::org_freedesktop_dbus::introspectable;
use dbus_wire::ty::DBusType;
use dbus_wire::{BodyBuf, ConnectionBuilder};

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);

    let (Some(peer), Some(path)) = (args.next(), args.next()) else {
        bail!("usage: introspect <peer> <path>");
    };

    let path = ObjectPath::new(&path)?;

    let c = ConnectionBuilder::new().session_bus().build().await?;

    let reply = c
        .call(peer, path, introspectable::INTERFACE, introspectable::INTROSPECT, BodyBuf::new())
        .await;

    let reply = match reply {
        Ok(reply) => reply,
        Err(error) => match error.call_name() {
            Some(name) => bail!("{name}: {error}"),
            None => bail!(error),
        },
    };

    let xml = String::decode(&mut reply.body())?;
    let node = dbus_xml::parse_interface(&xml)?;

    for interface in node.interfaces.iter() {
        println!("interface {}", interface.name);

        for method in interface.methods.iter() {
            let args: Vec<_> = method
                .arguments
                .iter()
                .map(|arg| format!("{}:{}", arg.name.unwrap_or("_"), arg.ty.as_str()))
                .collect();

            println!("  {}({})", method.name, args.join(", "));
        }
    }

    Ok(())
}
