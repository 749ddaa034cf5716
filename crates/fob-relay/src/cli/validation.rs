use crate::config::AllowedHosts;

/// Parse the `--allowed-hosts` value.
///
/// Accepts the keywords `all` and `auto`, or a comma-separated list of
/// hostnames. A leading dot (`.example.com`) allows the domain and all of
/// its subdomains.
///
/// # Errors
///
/// Returns an error message for an empty value or an empty list entry.
pub fn parse_allowed_hosts(s: &str) -> Result<AllowedHosts, String> {
    match s.trim() {
        "" => Err("Allowed hosts cannot be empty".to_string()),
        "all" => Ok(AllowedHosts::all()),
        "auto" => Ok(AllowedHosts::default()),
        list => {
            let hosts: Vec<&str> = list.split(',').map(str::trim).collect();
            if let Some(bad) = hosts.iter().find(|h| h.is_empty() || **h == ".") {
                return Err(format!("Invalid host entry '{}' in '{}'", bad, s));
            }
            Ok(AllowedHosts::list(hosts))
        }
    }
}
