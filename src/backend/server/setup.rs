use crate::{
    backend::{database::GlitchContext, utils::error::BackendResult},
    common::{newtypes::Uid, user::Account},
};
use log::info;

/// Creates the admin account from the config if it doesnt exist yet. Returns its uid, which is
/// added to the developer allowlist.
pub fn setup_admin(context: &GlitchContext) -> BackendResult<Uid> {
    let setup = &context.conf.setup;
    if let Ok(admin) = Account::read_from_name(&setup.admin_username, context) {
        return Ok(admin.uid);
    }
    info!("Creating admin account {}", setup.admin_username);
    let admin = Account::create_local(
        setup.admin_username.clone(),
        &setup.admin_password,
        None,
        None,
        context,
    )?;
    Ok(admin.uid)
}
