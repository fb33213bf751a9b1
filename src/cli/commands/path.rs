use crate::cli::Context;

pub async fn handle_path(ctx: &Context) -> anyhow::Result<()> {
    let path = ctx.resolver().resolve()?;
    println!("{}", path.display());
    Ok(())
}
