use super::session::DashboardSnapshot;

const TITLE: &str = "\u{1f527} Shadowbox Tool Tracking \u{2014} Live Update";

/// Render the dashboard page. Auto-refreshes while a session runs.
pub(super) fn render(snapshot: &DashboardSnapshot) -> String {
    let mut html = String::with_capacity(2048);
    html.push_str("<!doctype html>\n<html><head><meta charset=\"utf-8\">");
    html.push_str("<title>Shadowbox Tool Tracking</title>");
    if snapshot.running {
        html.push_str("<meta http-equiv=\"refresh\" content=\"1\">");
    }
    html.push_str("</head><body style=\"max-width:720px;margin:auto;font-family:sans-serif\">");
    html.push_str(&format!("<h1>{}</h1>", escape(TITLE)));
    html.push_str(
        "<p><b>Instructions</b></p><ol>\
         <li>Click <b>Start Detection</b> to open your camera and begin continuous detection.</li>\
         <li>Click <b>Stop Detection</b> to stop the camera loop.</li></ol>",
    );
    html.push_str(
        "<form method=\"post\" action=\"/start\" style=\"display:inline\">\
         <button type=\"submit\">Start Detection</button></form> \
         <form method=\"post\" action=\"/stop\" style=\"display:inline\">\
         <button type=\"submit\">Stop Detection</button></form>",
    );

    if snapshot.has_frame {
        html.push_str(&format!(
            "<figure><img src=\"/frame.jpg?f={}\" alt=\"Live Camera (Annotated)\" style=\"width:100%\">\
             <figcaption>Live Camera (Annotated)</figcaption></figure>",
            snapshot.frames
        ));
    }

    if !snapshot.statuses.is_empty() {
        html.push_str("<ul style=\"list-style:none;padding:0\">");
        for entry in &snapshot.statuses {
            html.push_str(&format!("<li>{}</li>", escape(&entry.display)));
        }
        html.push_str("</ul>");
    }

    if let Some(message) = &snapshot.message {
        html.push_str(&format!("<p>{}</p>", escape(message)));
    }
    html.push_str("</body></html>\n");
    html
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
