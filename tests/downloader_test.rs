// Downloader tests against a mocked water services endpoint

use hydroprep::clients::WaterServicesClient;
use hydroprep::config::Settings;
use hydroprep::processors::GaugeDownloader;
use hydroprep::readers::{MetadataReader, ObservationReader};
use hydroprep::utils::time::parse_month;
use hydroprep::ProcessingError;
use mockito::{Matcher, Server, ServerGuard};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

const SITE_BODY: &str = "\
# US Geological Survey
agency_cd\tsite_no\tstation_nm\tsite_tp_cd\tdec_lat_va\tdec_long_va\tcoord_acy_cd
5s\t15s\t50s\t7s\t16s\t16s\t1s
USGS\t16103000\tHANALEI RIVER NR HANALEI, KAUAI, HI\tST\t22.1797\t-159.4665\tS
";

const JANUARY_BODY: &str = "\
agency_cd\tsite_no\tdatetime\ttz_cd\t123_00065\t123_00065_cd
5s\t15s\t20d\t6s\t14n\t10s
USGS\t16103000\t2020-01-01 00:00\tHST\t1.52\tA
USGS\t16103000\t2020-01-01 00:15\tHST\t1.55\tA
";

const MARCH_BODY: &str = "\
agency_cd\tsite_no\tdatetime\ttz_cd\t123_00065\t123_00065_cd
5s\t15s\t20d\t6s\t14n\t10s
USGS\t16103000\t2020-03-31 23:45\tHST\t2.01\tP
";

fn month_query(start: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("sites".into(), "16103000".into()),
        Matcher::UrlEncoded("startDT".into(), format!("{}T00:00:00.000-10:00", start)),
    ])
}

fn settings_for(server: &ServerGuard, dir: &TempDir) -> Settings {
    let mut settings = Settings::load(None).unwrap();
    settings.base_dir = dir.path().to_path_buf();
    settings.site_service_url = server.url() + "/site/";
    settings.iv_service_url = server.url() + "/iv/";
    settings.first_month = "2020-01".to_string();
    settings.last_month = "2020-04".to_string();
    settings.max_workers = 2;
    settings
}

#[tokio::test]
async fn test_download_station_skips_failed_months() {
    let mut server = Server::new_async().await;

    let site = server
        .mock("GET", "/site/")
        .match_query(Matcher::UrlEncoded("sites".into(), "16103000".into()))
        .with_status(200)
        .with_body(SITE_BODY)
        .create_async()
        .await;
    let january = server
        .mock("GET", "/iv/")
        .match_query(month_query("2020-01-01"))
        .with_status(200)
        .with_body(JANUARY_BODY)
        .create_async()
        .await;
    let february = server
        .mock("GET", "/iv/")
        .match_query(month_query("2020-02-01"))
        .with_status(500)
        .create_async()
        .await;
    let march = server
        .mock("GET", "/iv/")
        .match_query(month_query("2020-03-01"))
        .with_status(200)
        .with_body(MARCH_BODY)
        .create_async()
        .await;
    let april = server
        .mock("GET", "/iv/")
        .match_query(month_query("2020-04-01"))
        .with_status(200)
        .with_body("<html>Service temporarily unavailable</html>")
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let settings = settings_for(&server, &dir);
    fs::create_dir_all(dir.path().join("raw_data")).unwrap();
    fs::write(
        settings.location_list_path(),
        "# name, island, code\nHanalei River,Kauai,USGS-16103000\n",
    )
    .unwrap();

    let downloader = GaugeDownloader::from_settings(&settings).unwrap();
    let summary = downloader.run(&settings, true).await.unwrap();

    assert_eq!(summary.stations, 1);
    assert_eq!(summary.months_fetched, 3);
    assert_eq!(summary.months_failed, 1);
    assert_eq!(summary.rows, 3);

    let stations = MetadataReader::new()
        .read_stations(&settings.station_metadata_path())
        .unwrap();
    assert_eq!(stations.len(), 1);
    assert_eq!(stations[0].station_id, "16103000");
    assert_eq!(stations[0].station_name, "Hanalei River");
    assert_eq!(stations[0].latitude, Some(22.1797));
    assert_eq!(stations[0].longitude, Some(-159.4665));

    // Concatenated in month order regardless of completion order
    let content = fs::read_to_string(settings.raw_observation_path("16103000")).unwrap();
    assert_eq!(
        content,
        "hst_timestamp,measurement,DQF,station_id\n\
         2020-01-01 00:00:00-10:00,1.52,A,16103000\n\
         2020-01-01 00:15:00-10:00,1.55,A,16103000\n\
         2020-03-31 23:45:00-10:00,2.01,P,16103000\n"
    );

    site.assert_async().await;
    january.assert_async().await;
    february.assert_async().await;
    march.assert_async().await;
    april.assert_async().await;
}

#[tokio::test]
async fn test_existing_station_file_is_not_downloaded() {
    let mut server = Server::new_async().await;

    let _site = server
        .mock("GET", "/site/")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;
    let months = server
        .mock("GET", "/iv/")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(JANUARY_BODY)
        .expect(0)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let settings = settings_for(&server, &dir);
    fs::create_dir_all(dir.path().join("raw_data/gauge_observations")).unwrap();
    fs::write(settings.location_list_path(), "Wailuku River,Hawaii,USGS-16717000\n").unwrap();
    let existing = settings.raw_observation_path("16717000");
    fs::write(&existing, "hst_timestamp,measurement,DQF,station_id\n").unwrap();

    let summary = GaugeDownloader::from_settings(&settings)
        .unwrap()
        .run(&settings, true)
        .await
        .unwrap();

    assert_eq!(summary.stations_skipped, 1);
    assert!(ObservationReader::new().read_observations(&existing).unwrap().is_empty());

    // Metadata lookup failed, so coordinates are left empty
    let stations = MetadataReader::new()
        .read_stations(&settings.station_metadata_path())
        .unwrap();
    assert_eq!(stations[0].station_id, "16717000");
    assert_eq!(stations[0].latitude, None);

    months.assert_async().await;
}

#[tokio::test]
async fn test_fetch_month_error_status() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/iv/")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let client =
        WaterServicesClient::with_base_urls(&(server.url() + "/site/"), &(server.url() + "/iv/"))
            .unwrap();
    let result = client
        .fetch_month("16103000", parse_month("2021-06").unwrap())
        .await;

    match result {
        Err(ProcessingError::ServiceStatus { status, url }) => {
            assert_eq!(status, 503);
            assert!(url.contains("startDT=2021-06-01T00:00:00.000-10:00"));
            assert!(url.contains("endDT=2021-06-30T23:59:59.999-10:00"));
        }
        other => panic!("expected service status error, got {:?}", other.map(|o| o.len())),
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_site_metadata_without_records() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/site/")
        .match_query(Matcher::UrlEncoded("format".into(), "rdb".into()))
        .with_status(200)
        .with_body("# No sites found matching all criteria\n")
        .create_async()
        .await;

    let client =
        WaterServicesClient::with_base_urls(&(server.url() + "/site/"), &(server.url() + "/iv/"))
            .unwrap();
    let metadata = client.fetch_site_metadata("99999999").await.unwrap();

    assert!(metadata.is_none());
    mock.assert_async().await;
}
