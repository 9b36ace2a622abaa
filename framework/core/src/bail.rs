/// Return this error from a VU's behaviour function to indicate that the VU is bailing.
///
/// This should be used when a VU hits an error that it cannot recover from but that is not fatal
/// to the scenario. The VU stops running iterations, runs its teardown and moves to `Stopped`.
/// Other VUs, including new ones started by the scheduler, are not affected.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct VuBailError {
    msg: String,
}

impl VuBailError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for VuBailError {
    fn default() -> Self {
        Self {
            msg: "VU is bailing".to_string(),
        }
    }
}
