// Writing the map points as a KML 2.2 document.

use std::io::Cursor;

use quick_xml::escape::escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::convkml::*;

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

type KmlWriter = Writer<Cursor<Vec<u8>>>;

fn write(w: &mut KmlWriter, ev: Event) -> ConvResult<()> {
    w.write_event(ev).map_err(|e| ConvError::WritingKml {
        message: e.to_string(),
    })
}

fn write_text_element(w: &mut KmlWriter, tag: &str, text: &str) -> ConvResult<()> {
    write(w, Event::Start(BytesStart::new(tag)))?;
    write(w, Event::Text(BytesText::new(text)))?;
    write(w, Event::End(BytesEnd::new(tag)))
}

/// The HTML shown in the balloon of a placemark.
pub fn description_html(d: &PointDescription) -> String {
    let mut lines = vec![
        format!("<b>{}</b>", escape(d.header.as_str())),
        format!("UF: {}", escape(d.state_code.as_str())),
        format!("Convênio: {}", escape(d.agreement_id.as_str())),
    ];
    if let Some(label) = &d.status_label {
        lines.push(format!("Status: {}", escape(label.as_str())));
    }
    if let Some(address) = &d.address {
        lines.push(format!("<i>{}</i>", escape(address.as_str())));
    }
    lines.join("<br/>")
}

fn write_style(w: &mut KmlWriter, style: MarkerStyle) -> ConvResult<()> {
    write(
        w,
        Event::Start(BytesStart::new("Style").with_attributes([("id", style.id())])),
    )?;
    write(w, Event::Start(BytesStart::new("IconStyle")))?;
    write(w, Event::Start(BytesStart::new("Icon")))?;
    write_text_element(w, "href", style.icon_href())?;
    write(w, Event::End(BytesEnd::new("Icon")))?;
    write(w, Event::End(BytesEnd::new("IconStyle")))?;
    write(w, Event::End(BytesEnd::new("Style")))
}

fn write_placemark(w: &mut KmlWriter, p: &MapPoint) -> ConvResult<()> {
    write(w, Event::Start(BytesStart::new("Placemark")))?;
    write_text_element(w, "name", &p.name)?;
    write(w, Event::Start(BytesStart::new("description")))?;
    write(
        w,
        Event::CData(BytesCData::new(description_html(&p.description))),
    )?;
    write(w, Event::End(BytesEnd::new("description")))?;
    write_text_element(w, "styleUrl", &format!("#{}", p.style.id()))?;
    write(w, Event::Start(BytesStart::new("Point")))?;
    // KML wants the longitude first.
    write_text_element(
        w,
        "coordinates",
        &format!("{},{},0", p.longitude, p.latitude),
    )?;
    write(w, Event::End(BytesEnd::new("Point")))?;
    write(w, Event::End(BytesEnd::new("Placemark")))
}

/// Renders the points, in order, as a KML document.
pub fn render_kml(document_name: &str, points: &[MapPoint]) -> ConvResult<String> {
    let mut w = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write(
        &mut w,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write(
        &mut w,
        Event::Start(BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)])),
    )?;
    write(&mut w, Event::Start(BytesStart::new("Document")))?;
    write_text_element(&mut w, "name", document_name)?;
    for style in MarkerStyle::ALL {
        write_style(&mut w, style)?;
    }
    for p in points {
        write_placemark(&mut w, p)?;
    }
    write(&mut w, Event::End(BytesEnd::new("Document")))?;
    write(&mut w, Event::End(BytesEnd::new("kml")))?;

    let bytes = w.into_inner().into_inner();
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => WritingKmlSnafu {
            message: e.to_string(),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(name: &str, style: MarkerStyle) -> MapPoint {
        MapPoint {
            name: name.to_string(),
            latitude: -14.79,
            longitude: -39.05,
            description: PointDescription {
                header: "Município: Ilhéus & Itabuna".to_string(),
                state_code: "BA".to_string(),
                agreement_id: name.to_string(),
                status_label: Some("45.0% (Em Execução)".to_string()),
                address: None,
            },
            style,
        }
    }

    #[test]
    fn placemarks() {
        let kml = render_kml(
            "Convênios <2024>",
            &[point("901234", MarkerStyle::Yellow), point("901235", MarkerStyle::Red)],
        )
        .unwrap();
        assert!(kml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(kml.contains("<kml xmlns=\"http://www.opengis.net/kml/2.2\">"));
        assert!(kml.contains("<name>Convênios &lt;2024&gt;</name>"));
        assert_eq!(kml.matches("<Style id=").count(), 4);
        assert_eq!(kml.matches("<Placemark>").count(), 2);
        assert!(kml.contains("<coordinates>-39.05,-14.79,0</coordinates>"));
        assert!(kml.contains("<styleUrl>#marker-yellow</styleUrl>"));
        assert!(kml.find("901234").unwrap() < kml.find("901235").unwrap());
        assert!(kml.contains("<![CDATA[<b>Município: Ilhéus &amp; Itabuna</b>"));
    }

    #[test]
    fn description_lines() {
        let mut d = point("7", MarkerStyle::Blue).description;
        d.status_label = None;
        d.address = Some("Ilhéus, Bahia".to_string());
        assert_eq!(
            description_html(&d),
            "<b>Município: Ilhéus &amp; Itabuna</b><br/>UF: BA<br/>Convênio: 7<br/><i>Ilhéus, Bahia</i>"
        );
    }

    #[test]
    fn empty_map() {
        let kml = render_kml("vazio", &[]).unwrap();
        assert!(!kml.contains("<Placemark>"));
        assert!(kml.trim_end().ends_with("</kml>"));
    }
}
