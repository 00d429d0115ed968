//! Capabilities document parsing.
//!
//! Accepts a WMS 1.3.0 `GetCapabilities` XML document or a JSON catalog of
//! the form `{"layers": [...]}`. Both produce a [`LayerCatalog`].

use super::types::{
    parse_time_extents, valid_time_range, LayerCatalog, LayerDescriptor, ServiceInfo, TimeExtent,
};
use crate::geo::BBox;
use serde::Deserialize;

/// Preferred projection for tile requests.
const PREFERRED_CRS: &str = "EPSG:3857";
/// Tile edge in pixels for GetMap templates.
const TILE_SIZE: u32 = 256;

/// Parses a capabilities response body.
///
/// `source_url` is the URL the document came from; it is the fallback
/// GetMap endpoint when the document does not name one.
pub fn parse_capabilities(body: &[u8], source_url: &str) -> Result<LayerCatalog, String> {
    let text = std::str::from_utf8(body).map_err(|e| format!("response is not UTF-8: {}", e))?;
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();

    if trimmed.starts_with('{') {
        parse_json_catalog(trimmed, source_url)
    } else if trimmed.starts_with('<') {
        parse_wms_xml(trimmed, source_url)
    } else {
        Err("response is neither XML nor JSON".to_string())
    }
}

// =============================================================================
// WMS XML
// =============================================================================

#[derive(Debug, Deserialize)]
struct WmsCapabilities {
    #[serde(rename = "@version", default)]
    version: String,
    #[serde(rename = "Service")]
    service: Option<WmsService>,
    #[serde(rename = "Capability")]
    capability: WmsCapability,
}

#[derive(Debug, Deserialize)]
struct WmsService {
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "Abstract")]
    abstract_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WmsCapability {
    #[serde(rename = "Request")]
    request: Option<WmsRequest>,
    #[serde(rename = "Layer", default)]
    layers: Vec<WmsLayer>,
}

#[derive(Debug, Deserialize)]
struct WmsRequest {
    #[serde(rename = "GetMap")]
    get_map: Option<WmsOperation>,
}

#[derive(Debug, Deserialize)]
struct WmsOperation {
    #[serde(rename = "Format", default)]
    formats: Vec<String>,
    #[serde(rename = "DCPType", default)]
    dcp_types: Vec<WmsDcpType>,
}

#[derive(Debug, Deserialize)]
struct WmsDcpType {
    #[serde(rename = "HTTP")]
    http: Option<WmsHttp>,
}

#[derive(Debug, Deserialize)]
struct WmsHttp {
    #[serde(rename = "Get")]
    get: Option<WmsGet>,
}

#[derive(Debug, Deserialize)]
struct WmsGet {
    #[serde(rename = "OnlineResource")]
    online_resource: Option<WmsOnlineResource>,
}

#[derive(Debug, Deserialize)]
struct WmsOnlineResource {
    #[serde(rename = "@href", alias = "@xlink:href")]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WmsLayer {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "CRS", default)]
    crs: Vec<String>,
    #[serde(rename = "EX_GeographicBoundingBox")]
    geographic_bbox: Option<WmsGeographicBBox>,
    #[serde(rename = "Dimension", default)]
    dimensions: Vec<WmsDimension>,
    #[serde(rename = "Style", default)]
    styles: Vec<WmsStyle>,
    #[serde(rename = "Layer", default)]
    layers: Vec<WmsLayer>,
}

#[derive(Debug, Deserialize)]
struct WmsGeographicBBox {
    #[serde(rename = "westBoundLongitude")]
    west: f64,
    #[serde(rename = "eastBoundLongitude")]
    east: f64,
    #[serde(rename = "southBoundLatitude")]
    south: f64,
    #[serde(rename = "northBoundLatitude")]
    north: f64,
}

#[derive(Debug, Deserialize)]
struct WmsDimension {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@default")]
    default: Option<String>,
    #[serde(rename = "$text", default)]
    values: String,
}

#[derive(Debug, Deserialize)]
struct WmsStyle {
    #[serde(rename = "Name")]
    name: Option<String>,
}

/// Settings inherited by nested layers.
#[derive(Clone, Default)]
struct Inherited {
    crs: Vec<String>,
    geographic_bbox: Option<BBox>,
}

fn parse_wms_xml(xml: &str, source_url: &str) -> Result<LayerCatalog, String> {
    let caps: WmsCapabilities =
        quick_xml::de::from_str(xml).map_err(|e| format!("invalid WMS capabilities: {}", e))?;

    let get_map = caps.capability.request.as_ref().and_then(|r| r.get_map.as_ref());
    let get_map_url = get_map
        .and_then(|op| {
            op.dcp_types
                .iter()
                .filter_map(|d| d.http.as_ref()?.get.as_ref()?.online_resource.as_ref()?.href.clone())
                .next()
        })
        .unwrap_or_else(|| base_url(source_url).to_string());
    let formats = get_map.map(|op| op.formats.clone()).unwrap_or_default();
    let format = pick_format(&formats).to_string();

    let service = ServiceInfo {
        title: caps.service.as_ref().map(|s| s.title.clone()).unwrap_or_default(),
        description: caps
            .service
            .as_ref()
            .and_then(|s| s.abstract_text.clone())
            .filter(|s| !s.trim().is_empty()),
        version: if caps.version.is_empty() {
            "1.3.0".to_string()
        } else {
            caps.version.clone()
        },
        get_map_url,
        formats,
    };

    let mut descriptors = Vec::new();
    for layer in &caps.capability.layers {
        collect_layers(
            layer,
            &Inherited::default(),
            &service.get_map_url,
            &format,
            &mut descriptors,
        );
    }

    Ok(LayerCatalog::new(service, descriptors))
}

/// Walks the layer tree, emitting every layer that has a `Name`.
fn collect_layers(
    layer: &WmsLayer,
    parent: &Inherited,
    get_map_url: &str,
    format: &str,
    out: &mut Vec<LayerDescriptor>,
) {
    let mut inherited = parent.clone();
    for crs in &layer.crs {
        if !inherited.crs.contains(crs) {
            inherited.crs.push(crs.clone());
        }
    }
    if let Some(b) = &layer.geographic_bbox {
        inherited.geographic_bbox = BBox::new(b.west, b.south, b.east, b.north).ok();
    }

    let name = layer.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    if let Some(name) = name {
        let time = layer
            .dimensions
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case("time"));
        let time_extents: Vec<TimeExtent> = time
            .map(|d| parse_time_extents(&d.values))
            .unwrap_or_default();
        let default_time = time
            .and_then(|d| d.default.clone())
            .filter(|d| !d.trim().is_empty())
            .or_else(|| last_value(&time_extents));

        let projection = choose_projection(&inherited.crs);
        let style = layer.styles.iter().find_map(|s| s.name.clone());
        let template = wms_template(get_map_url, name, style.as_deref(), format, &projection);

        out.push(LayerDescriptor {
            layer_id: name.to_string(),
            display_name: layer
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(name)
                .to_string(),
            description: layer
                .abstract_text
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from),
            valid_time_range: valid_time_range(&time_extents),
            time_extents,
            default_time,
            tile_url_template: template,
            projection,
            crs: inherited.crs.clone(),
            geographic_bbox: inherited.geographic_bbox,
            style,
        });
    }

    for child in &layer.layers {
        collect_layers(child, &inherited, get_map_url, format, out);
    }
}

fn last_value(extents: &[TimeExtent]) -> Option<String> {
    extents.last().map(|e| match e {
        TimeExtent::Instant { value } => value.clone(),
        TimeExtent::Interval { end, .. } => end.clone(),
    })
}

fn choose_projection(crs: &[String]) -> String {
    if crs.iter().any(|c| c == PREFERRED_CRS) {
        PREFERRED_CRS.to_string()
    } else {
        crs.first()
            .cloned()
            .unwrap_or_else(|| PREFERRED_CRS.to_string())
    }
}

fn pick_format(formats: &[String]) -> &str {
    ["image/png", "image/jpeg"]
        .into_iter()
        .find(|f| formats.iter().any(|have| have == f))
        .or_else(|| formats.first().map(String::as_str))
        .unwrap_or("image/png")
}

/// GetMap URL with `{bbox}` and `{time}` left as placeholders.
fn wms_template(get_map_url: &str, layer: &str, style: Option<&str>, format: &str, crs: &str) -> String {
    let base = base_url(get_map_url);
    let transparent = if format == "image/png" { "TRUE" } else { "FALSE" };
    format!(
        "{base}?SERVICE=WMS&VERSION=1.3.0&REQUEST=GetMap&LAYERS={layer}&STYLES={style}\
         &FORMAT={format}&TRANSPARENT={transparent}&CRS={crs}\
         &WIDTH={size}&HEIGHT={size}&BBOX={{bbox}}&TIME={{time}}",
        style = style.unwrap_or(""),
        format = format.replace('/', "%2F"),
        size = TILE_SIZE,
    )
}

/// URL without its query string.
fn base_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

// =============================================================================
// JSON catalog
// =============================================================================

#[derive(Debug, Deserialize)]
struct JsonCatalog {
    #[serde(default)]
    service: Option<JsonService>,
    layers: Vec<JsonLayer>,
}

#[derive(Debug, Deserialize)]
struct JsonService {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonLayer {
    #[serde(alias = "layer_id", alias = "identifier")]
    id: String,
    #[serde(default, alias = "display_name", alias = "name")]
    title: Option<String>,
    #[serde(default, alias = "abstract")]
    description: Option<String>,
    #[serde(default)]
    time: Option<JsonTime>,
    #[serde(alias = "url_template", alias = "template")]
    tile_url_template: String,
    #[serde(default)]
    projection: Option<String>,
    #[serde(default)]
    bbox: Option<[f64; 4]>,
}

#[derive(Debug, Deserialize)]
struct JsonTime {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default)]
    default: Option<String>,
}

fn parse_json_catalog(json: &str, source_url: &str) -> Result<LayerCatalog, String> {
    let catalog: JsonCatalog =
        serde_json::from_str(json).map_err(|e| format!("invalid JSON catalog: {}", e))?;

    let service = ServiceInfo {
        title: catalog.service.as_ref().map(|s| s.title.clone()).unwrap_or_default(),
        description: catalog.service.as_ref().and_then(|s| s.description.clone()),
        version: catalog
            .service
            .as_ref()
            .and_then(|s| s.version.clone())
            .unwrap_or_default(),
        get_map_url: base_url(source_url).to_string(),
        formats: Vec::new(),
    };

    let layers = catalog.layers.into_iter().map(|layer| {
        let mut time_extents: Vec<TimeExtent> = Vec::new();
        let mut default_time = None;
        if let Some(time) = layer.time {
            if let (Some(start), Some(end)) = (time.start, time.end) {
                time_extents.push(TimeExtent::Interval {
                    start,
                    end,
                    period: time.period,
                });
            }
            time_extents.extend(time.values.iter().filter_map(|v| TimeExtent::parse(v)));
            default_time = time.default.or_else(|| last_value(&time_extents));
        }
        let projection = layer.projection.unwrap_or_else(|| PREFERRED_CRS.to_string());

        LayerDescriptor {
            display_name: layer.title.unwrap_or_else(|| layer.id.clone()),
            layer_id: layer.id,
            description: layer.description,
            valid_time_range: valid_time_range(&time_extents),
            time_extents,
            default_time,
            tile_url_template: layer.tile_url_template,
            crs: vec![projection.clone()],
            projection,
            geographic_bbox: layer.bbox.and_then(|b| BBox::new(b[0], b[1], b[2], b[3]).ok()),
            style: None,
        }
    });

    Ok(LayerCatalog::new(service, layers))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub(crate) const GIBS_CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<WMS_Capabilities xmlns="http://www.opengis.net/wms" xmlns:xlink="http://www.w3.org/1999/xlink" version="1.3.0">
  <Service>
    <Name>WMS</Name>
    <Title>NASA Global Imagery Browse Services for EOSDIS</Title>
    <Abstract>Near real-time global imagery</Abstract>
  </Service>
  <Capability>
    <Request>
      <GetCapabilities>
        <Format>text/xml</Format>
      </GetCapabilities>
      <GetMap>
        <Format>image/jpeg</Format>
        <Format>image/png</Format>
        <DCPType>
          <HTTP>
            <Get>
              <OnlineResource xlink:type="simple" xlink:href="https://gibs.earthdata.nasa.gov/wms/epsg3857/best/wms.cgi?"/>
            </Get>
          </HTTP>
        </DCPType>
      </GetMap>
    </Request>
    <Layer queryable="0">
      <Title>NASA EOSDIS GIBS</Title>
      <CRS>EPSG:3857</CRS>
      <Layer queryable="0">
        <Name>MODIS_Terra_NDVI_8Day</Name>
        <Title>Vegetation Index (NDVI, 8-Day, Terra, MODIS)</Title>
        <Abstract>Normalized Difference Vegetation Index</Abstract>
        <EX_GeographicBoundingBox>
          <westBoundLongitude>-180</westBoundLongitude>
          <eastBoundLongitude>180</eastBoundLongitude>
          <southBoundLatitude>-85.051129</southBoundLatitude>
          <northBoundLatitude>85.051129</northBoundLatitude>
        </EX_GeographicBoundingBox>
        <Dimension name="time" units="ISO8601" default="2024-05-16" nearestValue="0">2000-02-18/2024-05-16/P8D</Dimension>
        <Style>
          <Name>default</Name>
          <Title>default</Title>
        </Style>
      </Layer>
      <Layer queryable="0">
        <Name>BlueMarble_ShadedRelief</Name>
        <Title>Blue Marble (Shaded Relief)</Title>
      </Layer>
      <Layer queryable="0">
        <Title>Grouping without a name</Title>
        <Layer>
          <Name>VIIRS_SNPP_CorrectedReflectance_TrueColor</Name>
          <Title>Corrected Reflectance (True Color)</Title>
          <Dimension name="time" units="ISO8601">2024-05-01,2024-05-02,2024-05-03</Dimension>
        </Layer>
      </Layer>
    </Layer>
  </Capability>
</WMS_Capabilities>"#;

    const SOURCE: &str =
        "https://gibs.earthdata.nasa.gov/wms/epsg3857/best/wms.cgi?SERVICE=WMS&REQUEST=GetCapabilities";

    #[test]
    fn test_parse_gibs_capabilities() {
        let catalog = parse_capabilities(GIBS_CAPABILITIES.as_bytes(), SOURCE).unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.ids().collect::<Vec<_>>(),
            vec![
                "BlueMarble_ShadedRelief",
                "MODIS_Terra_NDVI_8Day",
                "VIIRS_SNPP_CorrectedReflectance_TrueColor"
            ]
        );
        assert_eq!(catalog.service.version, "1.3.0");
        assert_eq!(
            catalog.service.title,
            "NASA Global Imagery Browse Services for EOSDIS"
        );
        assert_eq!(catalog.service.formats, vec!["image/jpeg", "image/png"]);
    }

    #[test]
    fn test_layer_time_dimension_interval() {
        let catalog = parse_capabilities(GIBS_CAPABILITIES.as_bytes(), SOURCE).unwrap();
        let ndvi = catalog.get("MODIS_Terra_NDVI_8Day").unwrap();

        assert_eq!(ndvi.display_name, "Vegetation Index (NDVI, 8-Day, Terra, MODIS)");
        assert_eq!(ndvi.default_time.as_deref(), Some("2024-05-16"));
        let range = ndvi.valid_time_range.unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2000, 2, 18).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 5, 16).unwrap());
        assert_eq!(ndvi.style.as_deref(), Some("default"));
        assert!(ndvi.geographic_bbox.is_some());
    }

    #[test]
    fn test_layer_time_list_default_is_last() {
        let catalog = parse_capabilities(GIBS_CAPABILITIES.as_bytes(), SOURCE).unwrap();
        let viirs = catalog
            .get("VIIRS_SNPP_CorrectedReflectance_TrueColor")
            .unwrap();
        assert_eq!(viirs.time_extents.len(), 3);
        assert_eq!(viirs.default_time.as_deref(), Some("2024-05-03"));
    }

    #[test]
    fn test_projection_inherited_from_parent() {
        let catalog = parse_capabilities(GIBS_CAPABILITIES.as_bytes(), SOURCE).unwrap();
        let relief = catalog.get("BlueMarble_ShadedRelief").unwrap();
        assert_eq!(relief.projection, "EPSG:3857");
        assert!(!relief.is_time_enabled());
    }

    #[test]
    fn test_template_uses_get_map_endpoint() {
        let catalog = parse_capabilities(GIBS_CAPABILITIES.as_bytes(), SOURCE).unwrap();
        let ndvi = catalog.get("MODIS_Terra_NDVI_8Day").unwrap();

        let template = &ndvi.tile_url_template;
        assert!(template.starts_with("https://gibs.earthdata.nasa.gov/wms/epsg3857/best/wms.cgi?SERVICE=WMS"));
        assert!(template.contains("LAYERS=MODIS_Terra_NDVI_8Day"));
        assert!(template.contains("FORMAT=image%2Fpng"));
        assert!(template.contains("CRS=EPSG:3857"));
        assert!(template.contains("BBOX={bbox}"));
        assert!(template.contains("TIME={time}"));
    }

    #[test]
    fn test_parse_json_catalog() {
        let json = r#"{
            "service": {"title": "Tiles", "version": "1.0"},
            "layers": [
                {
                    "id": "ndvi",
                    "title": "NDVI",
                    "time": {"start": "2020-01-01", "end": "2020-12-31", "period": "P1D"},
                    "tile_url_template": "https://tiles/{time}/{z}/{x}/{y}.png"
                }
            ]
        }"#;
        let catalog = parse_capabilities(json.as_bytes(), "https://tiles/catalog.json").unwrap();
        let layer = catalog.get("ndvi").unwrap();

        assert_eq!(layer.display_name, "NDVI");
        assert_eq!(layer.projection, "EPSG:3857");
        assert_eq!(layer.default_time.as_deref(), Some("2020-12-31"));
        assert_eq!(layer.valid_time_range.unwrap().days(), 366);
        assert_eq!(catalog.service.get_map_url, "https://tiles/catalog.json");
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(parse_capabilities(b"Service Unavailable", SOURCE).is_err());
        assert!(parse_capabilities(b"<html><body>oops", SOURCE).is_err());
        assert!(parse_capabilities(b"{\"nope\": 1}", SOURCE).is_err());
        assert!(parse_capabilities(&[0xff, 0xfe, 0x00], SOURCE).is_err());
    }
}
