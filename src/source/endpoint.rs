pub type Endpoint = str;

pub const REAL_DATA: &Endpoint = "/api/realdata";
