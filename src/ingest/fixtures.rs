/// Test fixtures: representative JSON payloads from the USGS NWIS IV and DV
/// services.
///
/// These fixtures are structurally complete but truncated to the minimum
/// needed to exercise the parser. They reflect the WaterML-as-JSON envelope
/// returned by both:
///   https://waterservices.usgs.gov/nwis/iv/?format=json&...
///   https://waterservices.usgs.gov/nwis/dv/?format=json&...
///
/// Response shape:
///   response.value.timeSeries[]
///     .sourceInfo.siteCode[0].value  — site number (string)
///     .variable.variableCode[0].value — parameter code (string)
///     .variable.noDataValue          — sentinel for missing data (-999999)
///     .values[0].value[]
///       .value     — the measurement as a STRING (not a number)
///       .dateTime  — ISO 8601; IV carries an offset, DV does not
///
/// Measurement values are JSON strings even when numeric, and USGS uses
/// non-numeric codes such as "Ice" or "Eqp" for equipment problems.

/// Brazos River at Waco (08096500) IV response: five 15-minute discharge
/// values of which one is the "Ice" code, one is the sentinel, and one has
/// an unparsable timestamp; plus a stage series that must be ignored.
#[cfg(test)]
pub(crate) fn fixture_iv_recent_json() -> &'static str {
    r#"{
      "value": {
        "timeSeries": [
          {
            "sourceInfo": {
              "siteName": "Brazos Rv at Waco, TX",
              "siteCode": [{ "value": "08096500", "network": "NWIS", "agencyCode": "USGS" }]
            },
            "variable": {
              "variableCode": [{ "value": "00060", "network": "NWIS" }],
              "variableName": "Streamflow, ft&#179;/s",
              "unit": { "unitCode": "ft3/s" },
              "noDataValue": -999999.0
            },
            "values": [{
              "value": [
                { "value": "1520", "qualifiers": ["P"], "dateTime": "2025-07-04T06:00:00.000-05:00" },
                { "value": "Ice", "qualifiers": ["P"], "dateTime": "2025-07-04T06:15:00.000-05:00" },
                { "value": "1610", "qualifiers": ["P"], "dateTime": "not-a-date" },
                { "value": "-999999", "qualifiers": ["P"], "dateTime": "2025-07-04T06:45:00.000-05:00" },
                { "value": "1780", "qualifiers": ["P"], "dateTime": "2025-07-04T07:00:00.000-05:00" }
              ],
              "qualifier": [{ "qualifierCode": "P", "qualifierDescription": "Provisional data subject to revision." }]
            }]
          },
          {
            "sourceInfo": {
              "siteName": "Brazos Rv at Waco, TX",
              "siteCode": [{ "value": "08096500", "network": "NWIS", "agencyCode": "USGS" }]
            },
            "variable": {
              "variableCode": [{ "value": "00065", "network": "NWIS" }],
              "variableName": "Gage height, ft",
              "unit": { "unitCode": "ft" },
              "noDataValue": -999999.0
            },
            "values": [{
              "value": [
                { "value": "12.40", "qualifiers": ["P"], "dateTime": "2025-07-04T06:00:00.000-05:00" }
              ],
              "qualifier": []
            }]
          }
        ]
      }
    }"#
}

/// Brazos River near Rosharon (08116650) DV response: six approved daily
/// means, 2025-06-27 through 2025-07-02, timestamps without offset.
#[cfg(test)]
pub(crate) fn fixture_dv_archive_json() -> &'static str {
    r#"{
      "value": {
        "timeSeries": [
          {
            "sourceInfo": {
              "siteName": "Brazos Rv nr Rosharon, TX",
              "siteCode": [{ "value": "08116650", "network": "NWIS", "agencyCode": "USGS" }]
            },
            "variable": {
              "variableCode": [{ "value": "00060", "network": "NWIS" }],
              "variableName": "Streamflow, ft&#179;/s",
              "unit": { "unitCode": "ft3/s" },
              "noDataValue": -999999.0
            },
            "values": [{
              "value": [
                { "value": "2210", "qualifiers": ["A"], "dateTime": "2025-06-27T00:00:00.000" },
                { "value": "2190", "qualifiers": ["A"], "dateTime": "2025-06-28T00:00:00.000" },
                { "value": "2400", "qualifiers": ["A"], "dateTime": "2025-06-29T00:00:00.000" },
                { "value": "3150", "qualifiers": ["A"], "dateTime": "2025-06-30T00:00:00.000" },
                { "value": "5820", "qualifiers": ["A"], "dateTime": "2025-07-01T00:00:00.000" },
                { "value": "9640", "qualifiers": ["A"], "dateTime": "2025-07-02T00:00:00.000" }
              ],
              "qualifier": [{ "qualifierCode": "A", "qualifierDescription": "Approved for publication -- Processing and review completed." }]
            }]
          }
        ]
      }
    }"#
}

/// Station with an empty value array, as during a sensor outage or a data
/// gap. Parser should return NoData.
#[cfg(test)]
pub(crate) fn fixture_empty_value_array_json() -> &'static str {
    r#"{
      "value": {
        "timeSeries": [
          {
            "sourceInfo": {
              "siteName": "Guadalupe Rv at Comfort, TX",
              "siteCode": [{ "value": "08167000", "network": "NWIS", "agencyCode": "USGS" }]
            },
            "variable": {
              "variableCode": [{ "value": "00060", "network": "NWIS" }],
              "variableName": "Streamflow, ft&#179;/s",
              "unit": { "unitCode": "ft3/s" },
              "noDataValue": -999999.0
            },
            "values": [{ "value": [], "qualifier": [] }]
          }
        ]
      }
    }"#
}

/// Only the sentinel value -999999: a timestamp is present but the
/// measurement is explicitly missing. Must never become a -999999 cfs reading.
#[cfg(test)]
pub(crate) fn fixture_sentinel_no_data_json() -> &'static str {
    r#"{
      "value": {
        "timeSeries": [
          {
            "sourceInfo": {
              "siteName": "Guadalupe Rv at Comfort, TX",
              "siteCode": [{ "value": "08167000", "network": "NWIS", "agencyCode": "USGS" }]
            },
            "variable": {
              "variableCode": [{ "value": "00060", "network": "NWIS" }],
              "variableName": "Streamflow, ft&#179;/s",
              "unit": { "unitCode": "ft3/s" },
              "noDataValue": -999999.0
            },
            "values": [{
              "value": [
                { "value": "-999999", "qualifiers": ["P"], "dateTime": "2025-07-04T05:00:00.000-05:00" }
              ],
              "qualifier": []
            }]
          }
        ]
      }
    }"#
}
