/// Request parameters that change what a probe puts on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Name to ask for with an IN/A query.
    ///
    /// When unset the DNS probe asks for `version.bind` in the CHAOS class.
    pub dns_name: Option<String>,
    /// Community string sent with the SNMP GetRequest.
    pub snmp_community: String,
    /// File requested by the TFTP read request.
    pub tftp_filename: String,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            dns_name: None,
            snmp_community: String::from("public"),
            tftp_filename: String::from("test.txt"),
        }
    }
}
