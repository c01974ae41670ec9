//! Portal page fixtures.

/// Action of the gatepass form on [`GATEPASS_PAGE`].
pub const FORM_ACTION: &str = "proof_uploade_code.php";

/// Form page as served to an authenticated session.
///
/// Extracting it with [`FORM_ACTION`] yields exactly [`GATEPASS_FIELDS`].
pub const GATEPASS_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Gatepass</title>
<script>var balance = "<input name='fake'>";</script></head>
<body>
<form id="search" action="search.php"><input name="q" value="ignored"></form>
<form method="post" action="proof_uploade_code.php" id="gp">
  <input type="hidden" name="csrf_token" value="tok&amp;123">
  <input type="hidden" name="balance_amount" value="15250.75">
  <input type="text" name="vehicle_no1" value="">
  <input name="driver_mob_no" value="9876543210">
  <input type="radio" name="tps" value="RTPS">
  <input type="radio" name="tps" value="BTPS" checked>
  <input type="checkbox" name="agree" checked>
  <input type="checkbox" name="newsletter" value="yes">
  <input type="text" name="locked" value="x" disabled>
  <input type="submit" name="generate_flyash_gatepass" value="Generate">
  <select name="silo_name">
    <option value="">-- choose --</option>
    <option value="SILO-A">Silo A</option>
    <option value="SILO-B" selected>Silo B</option>
  </select>
  <select name="silo_no">
    <option value="">--</option>
    <option value="3">3</option>
    <option value="4">4</option>
  </select>
  <select name="ash_type"><option>Dry &amp; Fine</option></select>
  <textarea name="remarks">
Morning slot</textarea>
</form>
</body></html>"#;

/// Fields of [`GATEPASS_PAGE`]'s gatepass form, sorted by name.
pub const GATEPASS_FIELDS: [(&str, &str); 10] = [
    ("agree", "on"),
    ("ash_type", "Dry & Fine"),
    ("balance_amount", "15250.75"),
    ("csrf_token", "tok&123"),
    ("driver_mob_no", "9876543210"),
    ("remarks", "Morning slot"),
    ("silo_name", "SILO-B"),
    ("silo_no", "3"),
    ("tps", "BTPS"),
    ("vehicle_no1", ""),
];

/// Page served once the session has expired.
pub const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Login</title></head>
<body>
<form method="post" action="login.php">
  <input type="text" name="username">
  <input type="password" name="password">
  <input type="submit" value="Sign in">
</form>
</body></html>"#;
