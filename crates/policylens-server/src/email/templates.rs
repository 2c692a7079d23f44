//! HTML templates for outbound notification emails

/// Palette matching the frontend design system
const PRIMARY: &str = "#ef443b";
const PRIMARY_FOREGROUND: &str = "#ffffff";
const BACKGROUND: &str = "#ffffff";
const FOREGROUND: &str = "#1a1a1a";
const CARD: &str = "#f8f9fa";
const MUTED_FOREGROUND: &str = "#6b7280";
const BORDER: &str = "#e5e7eb";

fn shell(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
  </head>
  <body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; line-height: 1.6; color: {FOREGROUND}; max-width: 600px; margin: 0 auto; padding: 20px; background-color: {BACKGROUND};">
    <div style="background: {PRIMARY}; padding: 30px; text-align: center; border-radius: 8px 8px 0 0;">
      <h1 style="color: {PRIMARY_FOREGROUND}; margin: 0; font-size: 24px; font-weight: 600;">{title}</h1>
    </div>
    <div style="background: {CARD}; padding: 30px; border-radius: 0 0 8px 8px; border: 1px solid {BORDER}; border-top: none;">
{body}
      <p style="font-size: 14px; color: {MUTED_FOREGROUND}; margin-top: 20px; margin-bottom: 0; line-height: 1.6;">
        Best regards,<br>
        The Policylens Team
      </p>
    </div>
  </body>
</html>"#
    )
}

fn button(url: &str, label: &str) -> String {
    format!(
        r#"      <div style="text-align: center; margin: 30px 0;">
        <a href="{url}" style="display: inline-block; background: {PRIMARY}; color: {PRIMARY_FOREGROUND}; padding: 12px 30px; text-decoration: none; border-radius: 6px; font-weight: 600; font-size: 16px;">{label}</a>
      </div>
"#
    )
}

fn paragraph(text: &str) -> String {
    format!(
        r#"      <p style="font-size: 16px; color: {FOREGROUND}; line-height: 1.6;">{text}</p>
"#
    )
}

/// Email body for a completed policy analysis
pub fn analysis_ready(
    display_name: &str,
    policy_file_name: &str,
    report_url: &str,
    policy_url: &str,
) -> String {
    let mut body = String::new();
    body.push_str(&paragraph(&format!("Hi {},", display_name)));
    body.push_str(&paragraph(&format!(
        "Great news! Your AI-powered analysis for <strong>{}</strong> has been completed successfully.",
        policy_file_name
    )));
    body.push_str(&paragraph("The analysis includes a comprehensive breakdown of:"));
    body.push_str(&format!(
        r#"      <ul style="font-size: 16px; padding-left: 20px; color: {FOREGROUND}; line-height: 1.8;">
        <li>Executive Summary</li>
        <li>Key Terms &amp; Conditions</li>
        <li>Coverage Details</li>
        <li>Exclusions</li>
        <li>Premiums &amp; Payment Information</li>
        <li>Potential Issues &amp; Concerns</li>
        <li>Recommendations</li>
      </ul>
"#
    ));
    body.push_str(&button(report_url, "View Full Report"));
    body.push_str(&format!(
        r#"      <p style="font-size: 14px; color: {MUTED_FOREGROUND}; margin-top: 30px; padding-top: 20px; border-top: 1px solid {BORDER}; line-height: 1.6;">
        You can also view the policy details <a href="{policy_url}" style="color: {PRIMARY}; text-decoration: none; font-weight: 500;">here</a>.
      </p>
"#
    ));

    shell("Your Analysis is Ready!", &body)
}

/// Email body for a completed policy comparison
pub fn comparison_ready(display_name: &str, policy_file_name: &str, comparison_url: &str) -> String {
    let mut body = String::new();
    body.push_str(&paragraph(&format!("Hi {},", display_name)));
    body.push_str(&paragraph(&format!(
        "Your policy comparison against <strong>{}</strong> is ready. It highlights coverage, premium, and exclusion changes between the two policies.",
        policy_file_name
    )));
    body.push_str(&button(comparison_url, "View Comparison"));

    shell("Your Comparison is Ready!", &body)
}

/// Email body for a password reset request
pub fn password_reset(display_name: &str, reset_url: &str) -> String {
    let mut body = String::new();
    body.push_str(&paragraph(&format!("Hi {},", display_name)));
    body.push_str(&paragraph(
        "We received a request to reset your password. Click the button below to choose a new one. This link expires in one hour.",
    ));
    body.push_str(&button(reset_url, "Reset Password"));
    body.push_str(&paragraph(
        "If you did not request a password reset, you can safely ignore this email.",
    ));

    shell("Reset Your Password", &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_ready_contains_links_and_name() {
        let html = analysis_ready(
            "Alice",
            "home-2026.pdf",
            "https://app.example.com/reports/r1",
            "https://app.example.com/policies/p1",
        );
        assert!(html.contains("Hi Alice,"));
        assert!(html.contains("<strong>home-2026.pdf</strong>"));
        assert!(html.contains("https://app.example.com/reports/r1"));
        assert!(html.contains("https://app.example.com/policies/p1"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_password_reset_contains_url() {
        let html = password_reset("there", "https://app.example.com/reset?token=abc");
        assert!(html.contains("https://app.example.com/reset?token=abc"));
        assert!(html.contains("expires in one hour"));
    }
}
