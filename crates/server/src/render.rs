//! HTML rendering for the home and identity pages.
//!
//! The pages are small and server-rendered with no client-side script; an
//! incomplete identity page carries a one-second refresh directive so the
//! browser polls until every proof has resolved.

use crate::assemble::PageView;
use keyproofs_core::Style;

/// Escape text for safe interpolation into HTML.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn stylesheet(style: &Style) -> String {
    let mut css = String::new();

    for (i, color) in style.palette.iter().enumerate() {
        css.push_str(&format!(".fg-color-{i} {{ color: {color}; }}\n"));
    }
    for (i, color) in style.palette.iter().enumerate() {
        css.push_str(&format!(".bg-color-{i} {{ background-color: {color}; }}\n"));
    }

    let bg = style.palette.get(7).map(String::as_str).unwrap_or("#fff");
    let heading = style.palette.get(3).map(String::as_str).unwrap_or("#000");
    css.push_str(&format!(
        r#"body {{
    background-image: url('{background}');
    background-repeat: repeat;
    background-color: {bg};
    padding-top: 1em;
}}
.heading {{
    background-image: url('{cover}');
    background-size: cover;
    background-repeat: no-repeat;
    background-color: {heading};
}}
.shade {{ background-color: {heading}80; border-radius: .25rem; }}
.lead {{ padding: 0; margin: 0; }}
.scroll {{ height: 20em; overflow: scroll; }}
@media only screen and (max-width: 768px) {{
    .center-md {{ text-align: center; width: 100% }}
    .jumbotron h1 {{ font-size: 2rem; }}
}}
"#,
        background = escape(&style.background),
        cover = escape(&style.cover),
    ));

    css
}

fn shell(app_name: &str, style: &Style, is_complete: bool, content: &str) -> String {
    let refresh = if is_complete {
        ""
    } else {
        r#"<meta http-equiv="refresh" content="1">"#
    };

    format!(
        r#"<html>
<head>
    {refresh}
    <link href="https://pagecdn.io/lib/bootstrap/4.5.1/css/bootstrap.min.css" rel="stylesheet" crossorigin="anonymous">
    <link href="https://pagecdn.io/lib/font-awesome/5.14.0/css/fontawesome.min.css" rel="stylesheet" crossorigin="anonymous">
    <link href="https://pagecdn.io/lib/font-awesome/5.14.0/css/solid.min.css" rel="stylesheet" crossorigin="anonymous">
    <link href="https://pagecdn.io/lib/font-awesome/5.14.0/css/regular.min.css" rel="stylesheet" crossorigin="anonymous">
    <link href="https://pagecdn.io/lib/font-awesome/5.14.0/css/brands.min.css" rel="stylesheet" crossorigin="anonymous">
    <style>
{css}
    </style>
</head>
<body>
    <div class="container">
        <div class="card">
{content}
            <div class="card-footer text-muted text-center">
                <a href="/">{app_name}</a>
                | Verify social identities using OpenPGP
                | Inspired by <a href="https://keyoxide.org/">keyoxide</a>
            </div>
        </div>
    </div>
</body>
</html>
"#,
        css = stylesheet(style),
        app_name = escape(app_name),
    )
}

fn heading(view: &PageView) -> String {
    if let Some(error) = &view.error {
        return format!(
            r#"<div class="jumbotron heading"><div class="container"><div class="row shade">
    <div class="col-xs center-md"><i class="fas fa-exclamation-triangle fa-4x fg-color-11"></i></div>
    <div class="col-md">
        <h1 class="display-8 fg-color-8">Something went wrong...</h1>
        <pre class="fg-color-11">{}</pre>
    </div>
</div></div></div>"#,
            escape(error)
        );
    }

    let inner = match &view.entity {
        Some(entity) => format!(
            r#"<div class="col-xs center-md"><img src="{avatar}" class="img-thumbnail" alt="avatar" style="width:88px; height:88px"></div>
    <div class="col-md center-md">
        <h1 class="display-8 fg-color-8">{name}</h1>
        <p class="lead fg-color-11"><i class="fas fa-fingerprint"></i> {fingerprint}</p>
    </div>
    <div class="col-xs center-md"><img src="/qr?s=-2&amp;c=OPENPGP4FPR%3A{fingerprint}" class="img-thumbnail" alt="qrcode" style="width:88px; height:88px"></div>"#,
            avatar = escape(&view.style.avatar),
            name = escape(entity.primary.name.as_deref().unwrap_or(&entity.primary.address)),
            fingerprint = escape(&entity.fingerprint),
        ),
        None => r#"<div class="col-md">
        <h1 class="display-8 fg-color-8">Loading...</h1>
        <p class="lead fg-color-11">Reading key from remote service.</p>
    </div>"#
            .to_string(),
    };

    format!(
        r#"<div class="jumbotron heading"><div class="container"><div class="row shade">
    {inner}
</div></div></div>"#
    )
}

fn proof_rows(view: &PageView) -> String {
    let mut rows = String::new();
    for proof in &view.proofs {
        // Status cases in discriminant order: Checking, Error, Invalid,
        // Verified.
        let status = match proof.status as u8 {
            0 => format!(
                r#"<a class="text-muted" href="{}"> <i class="fas fa-ellipsis-h"></i> Checking</a>"#,
                escape(&proof.verify_url)
            ),
            1 => format!(
                r#"<a class="text-warning" href="{}"> <i class="fas fa-exclamation-triangle"></i> Error</a>"#,
                escape(&proof.verify_url)
            ),
            2 => format!(
                r#"<a class="text-danger" href="{}"> <i class="far fa-times-circle"></i> Invalid</a>"#,
                escape(&proof.verify_url)
            ),
            _ => format!(
                r#"<a class="text-success" href="{}"> <i class="far fa-check-square"></i> Verified</a>"#,
                escape(&proof.verify_url)
            ),
        };

        let qr = if proof.service == "xmpp" {
            format!(
                r#"<br/><img src="/qr?s=-2&amp;c={}" alt="qrcode" style="width:88px; height:88px">"#,
                escape(&proof.link)
            )
        } else {
            String::new()
        };

        rows.push_str(&format!(
            r#"<li class="list-group-item">
    <div>
        <a title="{link}" class="font-weight-bold" href="{link}"><i title="{service}" class="{icon}"></i> {name}</a>
        {status}
    </div>
    <div>{qr}</div>
</li>
"#,
            link = escape(&proof.link),
            service = escape(&proof.service),
            icon = escape(&proof.icon),
            name = escape(&proof.name),
        ));
    }
    rows
}

fn identity_content(view: &PageView) -> String {
    let mut content = heading(view);
    content.push_str(r#"<div class="container"><div class="row">"#);
    content.push_str(r#"<div class="col-lg-4 col-md-12 col-sm-12 col-xs-12">"#);

    if let Some(entity) = &view.entity {
        content.push_str(
            r#"<div class="card"><div class="card-header">Contact</div><div class="list-group list-group-flush">"#,
        );
        content.push_str(&format!(
            r#"<a href="mailto:{addr}" class="list-group-item list-group-item-action"><i class="fas fa-envelope"></i> <b>{name} &lt;{addr}&gt;</b> <span class="badge badge-secondary">Primary</span></a>"#,
            addr = escape(&entity.primary.address),
            name = escape(entity.primary.name.as_deref().unwrap_or_default()),
        ));
        for email in &entity.emails {
            content.push_str(&format!(
                r#"<a href="mailto:{addr}" class="list-group-item list-group-item-action"><i class="far fa-envelope"></i> {name} &lt;{addr}&gt;</a>"#,
                addr = escape(&email.address),
                name = escape(email.name.as_deref().unwrap_or_default()),
            ));
        }
        content.push_str("</div></div><br />");

        if view.has_proofs {
            content.push_str(
                r#"<div class="card"><div class="card-header">Proofs</div><ul class="list-group list-group-flush">"#,
            );
            content.push_str(&proof_rows(view));
            content.push_str("</ul></div>");
        } else {
            // A settled page without proofs is not the same as one still
            // waiting on them.
            let body = if view.is_complete {
                "No proofs published."
            } else {
                "Loading..."
            };
            content.push_str(&format!(
                r#"<div class="card"><div class="card-header">Proofs</div><div class="card-body">{body}</div></div><br/>"#,
            ));
        }
    }

    content.push_str("</div>");

    if let Some(entity) = &view.entity {
        content.push_str(&format!(
            r#"<div class="col-lg-8 col-md-12 col-sm-12 col-xs-12">
    <div class="card"><div class="card-header">Public Key</div>
    <div class="card-body scroll"><pre><code>{}</code></pre></div></div>
</div>"#,
            escape(&entity.armor_text)
        ));
    }

    content.push_str("</div></div>");
    content
}

/// Render the identity page.
pub fn identity_page(app_name: &str, view: &PageView) -> String {
    shell(app_name, &view.style, view.is_complete, &identity_content(view))
}

/// Render the home page with the lookup form.
pub fn home_page(app_name: &str) -> String {
    let style = Style::fallback();
    let content = r#"<div class="jumbotron heading"><div class="container"><div class="row shade">
    <div class="col-md">
        <h1 class="display-8 fg-color-8">Key Proofs</h1>
        <p class="lead fg-color-11">Verify social identities using OpenPGP</p>
    </div>
</div></div></div>
<br/>
<div class="card"><div class="card-body">
    <form method="GET" action="/">
        <div class="input-group mb-3">
            <input type="text" name="id" class="form-control" placeholder="Email or Fingerprint..." aria-label="Email or Fingerprint" aria-describedby="button-addon" />
            <div class="input-group-append">
                <button class="btn btn-outline-secondary" type="submit" id="button-addon">GO</button>
            </div>
        </div>
    </form>
</div></div>
<div class="container">
    <h2>About KeyProofs</h2>
    <p>KeyProofs verifies decentralized online identity proofs. Keys are looked up via
    <a href="https://datatracker.ietf.org/doc/draft-koch-openpgp-webkey-service/">Web Key Directory</a>
    or from <a href="https://keys.openpgp.org/">keys.openpgp.org</a>.</p>
    <ul>
        <li>You decide which accounts are linked together and where that data is stored.</li>
        <li>KeyProofs does not store your identity data; it merely verifies the proofs and displays them.</li>
        <li>A verified proof demonstrates ownership of an account and builds trust.</li>
        <li>No JavaScript runs on this page; all lookups happen server side.</li>
    </ul>
</div>"#;

    shell(app_name, &style, true, content)
}
